//! One-time nonce replay guard
//!
//! A nonce is accepted at most once within its validity window. The
//! existence check and the record write are one atomic check-and-set in
//! the store; a separate read followed by a write would let two replayed
//! copies of the same request race past each other. After the window a
//! value may legitimately be reused (accepted risk, bounded by window
//! size).

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error};

use crate::domain::keys::prefix;
use crate::infrastructure::store::{CounterStore, current_time_secs};

/// Outcome of a nonce check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceVerdict {
    Accepted,
    /// Client timestamp outside the window: stale or clock-skewed, treated
    /// as invalid rather than merely "possibly replayed"
    Stale,
    /// The nonce was already seen within its window
    Replayed,
}

/// Replay guard over the shared store.
pub struct NonceGuard {
    store: Arc<dyn CounterStore>,
    key_prefix: String,
}

impl NonceGuard {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            key_prefix: prefix::NONCE.to_string(),
        }
    }

    /// Hash the untrusted nonce value into a fixed-length store key.
    fn nonce_key(&self, nonce: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(nonce.as_bytes());
        format!("{}:{}", self.key_prefix, hex::encode(hasher.finalize()))
    }

    /// Full check: staleness first, then atomic claim.
    ///
    /// Store failures fail open (accepted).
    pub async fn check(
        &self,
        nonce: &str,
        client_timestamp: i64,
        window_secs: u64,
    ) -> NonceVerdict {
        let now = current_time_secs() as i64;
        if (now - client_timestamp).unsigned_abs() > window_secs {
            debug!(
                client_timestamp = client_timestamp,
                window_secs = window_secs,
                "Nonce rejected: timestamp outside window"
            );
            return NonceVerdict::Stale;
        }

        let key = self.nonce_key(nonce);
        match self.store.claim_once(&key, window_secs).await {
            Ok(true) => NonceVerdict::Accepted,
            Ok(false) => {
                debug!("Nonce rejected: replay detected");
                NonceVerdict::Replayed
            }
            Err(e) => {
                error!("Nonce check failed open: {}", e);
                NonceVerdict::Accepted
            }
        }
    }

    /// Validate a nonce. Returns `true` exactly once per value per window.
    pub async fn validate(&self, nonce: &str, client_timestamp: i64, window_secs: u64) -> bool {
        self.check(nonce, client_timestamp, window_secs).await == NonceVerdict::Accepted
    }

    /// Validate a batch, each item independently. A failure on one item
    /// does not affect the others; there is no transaction across the
    /// batch.
    pub async fn validate_batch(
        &self,
        items: &[(String, i64)],
        window_secs: u64,
    ) -> Vec<bool> {
        let mut results = Vec::with_capacity(items.len());
        for (nonce, client_timestamp) in items {
            results.push(self.validate(nonce, *client_timestamp, window_secs).await);
        }
        results
    }
}
