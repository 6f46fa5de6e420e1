//! Idempotency keys for ledger mutations.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

/// Longest key accepted from a client.
pub const MAX_KEY_LEN: usize = 200;

/// Opaque token that makes a ledger mutation safe to retry.
///
/// A key is scoped to one operation and one acting user; the store applies
/// a given key at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Validates a client-supplied key.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the key is blank or
    /// longer than [`MAX_KEY_LEN`].
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "idempotency_key is required".to_string(),
            ));
        }
        if trimmed.len() > MAX_KEY_LEN {
            return Err(GatewayError::InvalidRequest(format!(
                "idempotency_key must be at most {MAX_KEY_LEN} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Generates a fresh server-side key.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_is_rejected() {
        assert!(IdempotencyKey::parse("   ").is_err());
    }

    #[test]
    fn oversized_key_is_rejected() {
        assert!(IdempotencyKey::parse(&"k".repeat(MAX_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn key_is_trimmed() {
        let key = IdempotencyKey::parse("  gift-1 ").ok();
        assert_eq!(key.as_ref().map(IdempotencyKey::as_str), Some("gift-1"));
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(IdempotencyKey::generate(), IdempotencyKey::generate());
    }
}
