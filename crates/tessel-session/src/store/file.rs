//! Filesystem session store.
//!
//! Layout under the configured root:
//!
//! ```text
//! <path>/<session id>/<key>
//! ```
//!
//! One directory per session, one file per key holding the codec-encoded
//! value. The directory's modification time is the session's liveness marker,
//! which lets [`Store::init`] recover sessions left behind by a previous process.

use std::collections::HashMap;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::codec;
use crate::error::{Error, Result};
use crate::store::Store;

/// Registered name of the filesystem backend.
pub const STORE_FILE: &str = "file";

/// Configuration payload of the filesystem backend, given as JSON.
///
/// ```json
/// {"path": "/var/lib/app/sessions"}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct FileStoreConfig {
    /// Root directory holding one subdirectory per session.
    pub path: PathBuf,
}

impl FileStoreConfig {
    /// Parse the JSON configuration payload.
    pub fn parse(conf: &str) -> Result<Self> {
        serde_json::from_str(conf).map_err(|e| Error::Config(format!("file store: {}", e)))
    }
}

/// Filesystem handle for one session.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    sid: String,
}

impl FileStore {
    /// Open the handle for `sid` under `root`, creating its directory.
    ///
    /// An empty `sid` yields a handle that is only good for [`Store::init`].
    pub fn open(root: impl Into<PathBuf>, sid: &str) -> Result<Self> {
        let store = Self {
            root: root.into(),
            sid: sid.to_string(),
        };
        if !sid.is_empty() {
            validate_component(sid)?;
            fs::create_dir_all(store.dir())?;
        }
        Ok(store)
    }

    /// Root directory of the backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding this session's keys.
    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.sid)
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        validate_component(key)?;
        Ok(self.dir().join(key))
    }
}

/// Factory registered as [`STORE_FILE`].
pub fn new_file_store(sid: &str, conf: &str) -> Result<Box<dyn Store>> {
    let config = FileStoreConfig::parse(conf)?;
    Ok(Box::new(FileStore::open(config.path, sid)?))
}

/// Reject names that would not map to exactly one file inside the session directory.
fn validate_component(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(Error::InvalidKey(name.to_string()));
    }
    Ok(())
}

fn not_found_ok(result: io::Result<()>) -> Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => Ok(other?),
    }
}

impl Store for FileStore {
    fn init(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        fs::create_dir_all(&self.root)?;

        let mut sessions = HashMap::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_dir() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
            sessions.insert(name, DateTime::<Utc>::from(modified));
        }

        debug!(
            root = %self.root.display(),
            count = sessions.len(),
            "Recovered sessions from disk"
        );
        Ok(sessions)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.key_path(key)?;
        fs::write(&path, codec::encode(&value)?)?;
        trace!(session_id = %self.sid, key = %key, "Wrote session key");
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Value> {
        let path = self.key_path(key).ok()?;
        let bytes = fs::read(path).ok()?;
        codec::decode(&bytes).ok()
    }

    fn iterate(&self, f: &mut dyn FnMut(&str, &Value)) {
        let Ok(entries) = fs::read_dir(self.dir()) else {
            return;
        };
        for entry in entries.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if validate_component(&name).is_err() || !entry.path().is_file() {
                continue;
            }
            if let Some(value) = fs::read(entry.path())
                .ok()
                .and_then(|bytes| codec::decode(&bytes).ok())
            {
                f(&name, &value);
            }
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        not_found_ok(fs::remove_file(path))
    }

    fn update(&self) -> Result<()> {
        let now = SystemTime::now();
        let times = FileTimes::new().set_accessed(now).set_modified(now);
        File::open(self.dir())?.set_times(times)?;
        Ok(())
    }

    fn last_update(&self) -> DateTime<Utc> {
        let modified = fs::metadata(self.dir())
            .and_then(|m| m.modified())
            .unwrap_or(UNIX_EPOCH);
        DateTime::<Utc>::from(modified)
    }

    fn expire(&self) -> Result<()> {
        not_found_ok(fs::remove_dir_all(self.dir()))
    }

    fn session_id(&self) -> &str {
        &self.sid
    }
}
