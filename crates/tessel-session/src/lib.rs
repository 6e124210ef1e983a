//! Server-side session store with pluggable backends and idle expiry.
//!
//! This crate provides a process-local key-value store addressed by opaque
//! session ids, with:
//! - Pluggable backends registered by name (in-memory and filesystem built in)
//! - A recency index that finds idle sessions without scanning every session
//! - A background sweep that expires sessions idle beyond their lifetime
//! - Drain-on-close shutdown: `close` waits for in-flight operations
//!
//! It knows nothing about transports; callers carry the session id however
//! they like (e.g. a cookie).
//!
//! # Example
//!
//! ```rust,ignore
//! use tessel_session::{ManagerConfig, SessionManager};
//!
//! let config = ManagerConfig::default()
//!     .with_backend("file")
//!     .with_backend_config(r#"{"path": "/var/lib/app/sessions"}"#)
//!     .with_max_lifetime(Duration::from_secs(3600));
//!
//! let manager = SessionManager::new(config);
//! let sid = manager.set("", "user_id", 42.into()).await?;
//! ```

mod admission;
pub mod codec;
mod config;
mod error;
mod id;
mod lru;
mod manager;
pub mod registry;
pub mod store;

pub use config::{DEFAULT_MAX_LIFETIME, DEFAULT_SWEEP_INTERVAL, ManagerConfig};
pub use error::{Error, Result};
pub use id::{SID_LENGTH, SessionId};
pub use lru::LruIndex;
pub use manager::{ManagerStats, SessionManager};
pub use store::file::{FileStore, FileStoreConfig, STORE_FILE};
pub use store::memory::{MemoryStore, STORE_MEMORY};
pub use store::{Store, StoreFactory};
