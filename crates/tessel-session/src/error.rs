//! Error types for session store operations.

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No backend is registered under the requested name.
    #[error("Session store not registered: {0}")]
    UnknownBackend(String),

    /// Backend configuration payload is malformed or incomplete.
    #[error("Invalid session store configuration: {0}")]
    Config(String),

    /// Key cannot be used by the backend (e.g. would escape its directory).
    #[error("Invalid session key: {0:?}")]
    InvalidKey(String),

    /// The session handle was already destroyed.
    #[error("Session expired: {0}")]
    Expired(String),

    /// IO error from a persistent backend.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Error reported by a third-party backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
