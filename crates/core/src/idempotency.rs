//! Idempotency keys for deduplicating session-creation requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum accepted key length.
const MAX_KEY_LEN: usize = 128;

/// Opaque key deduplicating retried session-creation requests.
/// One-to-one with a session for its lifetime.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Validate and wrap a caller-supplied key.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidIdempotencyKey(
                "key must not be empty".to_string(),
            ));
        }
        if s.len() > MAX_KEY_LEN {
            return Err(crate::Error::InvalidIdempotencyKey(format!(
                "key exceeds {MAX_KEY_LEN} characters"
            )));
        }
        if s.chars().any(|c| c.is_control()) {
            return Err(crate::Error::InvalidIdempotencyKey(
                "key contains control characters".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    /// Generate a fresh key for callers that did not supply one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdempotencyKey({})", self.0)
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let key = IdempotencyKey::parse("client-retry-42").unwrap();
        assert_eq!(key.as_str(), "client-retry-42");
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!(IdempotencyKey::parse("").is_err());
        assert!(IdempotencyKey::parse(&"x".repeat(129)).is_err());
        assert!(IdempotencyKey::parse("line\nbreak").is_err());
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(IdempotencyKey::generate(), IdempotencyKey::generate());
    }
}
