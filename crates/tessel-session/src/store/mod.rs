//! Backend contract for session storage.
//!
//! A backend provides one [`Store`] handle per session, created by a
//! [`StoreFactory`] registered under a unique name (see [`crate::registry`]).
//! The manager owns every handle it creates and is the only caller of these
//! methods; backends never see an operation for a session the manager does
//! not track.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;

pub mod file;
pub mod memory;

/// Creates a handle bound to `session_id`, configured by the opaque `config` payload.
///
/// The manager calls this once with an empty id at construction, only to call
/// [`Store::init`] on the result, and again with a real id for every new session.
pub type StoreFactory = Arc<dyn Fn(&str, &str) -> Result<Box<dyn Store>> + Send + Sync>;

/// Per-session backend handle.
///
/// Methods are synchronous. The manager calls them while holding its session
/// lock, from whichever async worker runs the operation, so a backend doing
/// blocking I/O (like [`file::FileStore`]) holds that worker and that lock
/// for the duration of the call. No timeout is applied.
pub trait Store: Send + Sync {
    /// Report sessions that already exist in the backend, with their last update time.
    ///
    /// Backends without persistence return an empty map.
    fn init(&self) -> Result<HashMap<String, DateTime<Utc>>>;

    /// Store `value` under `key`.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Read the value under `key`, or `None` if absent or unreadable.
    fn get(&self, key: &str) -> Option<Value>;

    /// Visit every key-value pair of the session. Unreadable entries are skipped.
    fn iterate(&self, f: &mut dyn FnMut(&str, &Value));

    /// Remove `key`.
    fn delete(&self, key: &str) -> Result<()>;

    /// Refresh the backend's own liveness marker.
    fn update(&self) -> Result<()>;

    /// When the session was last updated, as the backend sees it.
    fn last_update(&self) -> DateTime<Utc>;

    /// Destroy the session's data. Irreversible.
    fn expire(&self) -> Result<()>;

    /// Id this handle is bound to.
    fn session_id(&self) -> &str;
}
