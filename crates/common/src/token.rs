//! Email confirmation tokens.
//!
//! Tokens are handed to the requester by email; only their SHA-256 hash is
//! persisted, so a leaked request row cannot be used to confirm an address.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A freshly issued confirmation token.
#[derive(Debug, Clone)]
pub struct ConfirmationToken {
    /// The secret handed to the requester.
    pub token: String,
    /// SHA-256 hex digest of the secret, for persistence.
    pub hash: String,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

impl ConfirmationToken {
    /// Issue a new random token valid for `ttl_secs` seconds.
    #[must_use]
    pub fn issue(ttl_secs: u64) -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let hash = hash_token(&token);
        let expires_at = Utc::now() + Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX));

        Self {
            token,
            hash,
            expires_at,
        }
    }
}

/// Hash a token for storage or lookup.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
