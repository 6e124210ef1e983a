//! In-memory session store.
//!
//! Each handle keeps its own key-value map. Nothing survives the process,
//! so [`Store::init`] never reports existing sessions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::Store;

/// Registered name of the in-memory backend.
pub const STORE_MEMORY: &str = "memory";

#[derive(Debug)]
struct MemoryState {
    /// `None` once the session has been expired.
    data: Option<HashMap<String, Value>>,
    last_update: DateTime<Utc>,
}

/// In-memory handle for one session.
#[derive(Debug)]
pub struct MemoryStore {
    sid: String,
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty handle bound to `sid`.
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            state: RwLock::new(MemoryState {
                data: Some(HashMap::new()),
                last_update: Utc::now(),
            }),
        }
    }

    /// Number of keys held, or 0 once expired.
    pub fn len(&self) -> usize {
        self.state.read().data.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`Store::expire`] has been called on this handle.
    pub fn is_expired(&self) -> bool {
        self.state.read().data.is_none()
    }
}

/// Factory registered as [`STORE_MEMORY`]. The configuration payload is ignored.
pub fn new_memory_store(sid: &str, _conf: &str) -> Result<Box<dyn Store>> {
    Ok(Box::new(MemoryStore::new(sid)))
}

impl Store for MemoryStore {
    fn init(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        Ok(HashMap::new())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut state = self.state.write();
        let Some(data) = state.data.as_mut() else {
            return Err(Error::Expired(self.sid.clone()));
        };
        data.insert(key.to_string(), value);
        state.last_update = Utc::now();
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.state.read().data.as_ref()?.get(key).cloned()
    }

    fn iterate(&self, f: &mut dyn FnMut(&str, &Value)) {
        if let Some(data) = self.state.read().data.as_ref() {
            for (key, value) in data {
                f(key, value);
            }
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.write();
        if let Some(data) = state.data.as_mut() {
            data.remove(key);
            state.last_update = Utc::now();
        }
        Ok(())
    }

    fn update(&self) -> Result<()> {
        self.state.write().last_update = Utc::now();
        Ok(())
    }

    fn last_update(&self) -> DateTime<Utc> {
        self.state.read().last_update
    }

    fn expire(&self) -> Result<()> {
        self.state.write().data = None;
        Ok(())
    }

    fn session_id(&self) -> &str {
        &self.sid
    }
}
