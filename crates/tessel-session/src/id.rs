//! Session identifiers.

use std::fmt;

use rand::TryRngCore;
use rand::rngs::OsRng;

/// Number of random bytes in a session id (rendered as twice as many hex chars).
pub const SID_LENGTH: usize = 16;

/// Opaque session identifier.
///
/// The empty id is the "no session" sentinel: every manager operation
/// addressed to it is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// The "no session" sentinel.
    pub fn none() -> Self {
        Self(String::new())
    }

    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random candidate id.
    ///
    /// # Panics
    ///
    /// Panics if the OS randomness source cannot fill the buffer. A shorter
    /// or weaker id is never produced instead.
    pub fn random() -> Self {
        let mut bytes = [0u8; SID_LENGTH];
        if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
            panic!("can not read {SID_LENGTH} random bytes for session id: {e}");
        }
        Self(hex::encode(bytes))
    }

    /// Whether this is the "no session" sentinel.
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_is_fixed_length_hex() {
        let id = SessionId::random();
        assert_eq!(id.as_str().len(), SID_LENGTH * 2);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!id.is_none());
    }

    #[test]
    fn test_random_ids_differ() {
        let ids: HashSet<SessionId> = (0..1000).map(|_| SessionId::random()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_none_sentinel() {
        assert!(SessionId::none().is_none());
        assert!(SessionId::from("").is_none());
        assert_eq!(SessionId::default(), SessionId::none());
        assert_eq!(SessionId::from("abc").to_string(), "abc");
    }
}
