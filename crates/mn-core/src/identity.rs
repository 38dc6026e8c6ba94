//! # Identity Hashing
//!
//! Maps (remote address, optional email) to a stable, privacy-preserving
//! fingerprint. The fingerprint is what the engine stores and what vote
//! deduplication compares; raw addresses never reach the store.

use sha2::{Digest, Sha256};

#[derive(Clone)]
pub struct IdentityHasher {
    salt: String,
}

impl IdentityHasher {
    /// Accepts a salt string (e.g., from configuration).
    pub fn new(salt: &str) -> Self {
        Self {
            salt: salt.to_string(),
        }
    }

    /// Prefers the email as the identity anchor so the same person keeps
    /// one fingerprint across networks; falls back to the address.
    pub fn fingerprint(&self, remote_addr: &str, email: Option<&str>) -> String {
        let ident = match email {
            Some(e) if !e.is_empty() => e,
            _ => remote_addr,
        };
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(ident.as_bytes());
        let hash = hex::encode(hasher.finalize());
        // 16 hex chars are plenty for display and dedup
        hash[..16].to_string()
    }
}
