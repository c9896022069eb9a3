// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted refresh token model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Server-side record that makes a refresh token revocable.
///
/// Only the SHA-256 digest of the token is stored; lookups hash the
/// presented token first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Hex-encoded SHA-256 of the token (also the document ID)
    pub token_hash: String,
    pub user_id: String,
    /// Equal to the `exp` claim of the signed token
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(token: &str, user_id: &str, expires_at: DateTime<Utc>) -> Self {
        Self {
            token_hash: hash_token(token),
            user_id: user_id.to_string(),
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// A record is valid only strictly before its expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Digest used as the storage key for a refresh token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_hex() {
        let a = hash_token("token-a");
        assert_eq!(a, hash_token("token-a"));
        assert_ne!(a, hash_token("token-b"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let record = RefreshTokenRecord::new("t", "user-1", now);
        assert!(record.is_expired_at(now));
        assert!(!record.is_expired_at(now - chrono::Duration::seconds(1)));
        assert_ne!(record.token_hash, "t");
    }
}
