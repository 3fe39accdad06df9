//! Sliding-Window Rate Limiter
//!
//! Exact counting within a continuously moving window: pruning, counting,
//! and marker insertion happen in one atomic store operation, so two
//! callers racing on the last slot can never both be admitted. Stricter
//! than the token bucket; use it where a hard cap matters more than burst
//! tolerance.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::admission::RateLimitDecision;
use crate::domain::keys::LimitKey;
use crate::infrastructure::store::CounterStore;

/// Sliding window rate limiter
pub struct SlidingWindowLimiter {
    store: Arc<dyn CounterStore>,
    key_prefix: String,
}

impl SlidingWindowLimiter {
    /// Create a new sliding window limiter
    pub fn new(store: Arc<dyn CounterStore>, key_prefix: &str) -> Self {
        Self {
            store,
            key_prefix: key_prefix.to_string(),
        }
    }

    /// Check whether one more event is allowed for `key` within the window.
    ///
    /// Store failures fail open: the event is allowed and the full limit is
    /// reported as remaining.
    pub async fn allow(&self, key: &LimitKey, window_secs: u64, limit: u32) -> RateLimitDecision {
        let store_key = key.to_store_key(&self.key_prefix);

        match self
            .store
            .window_admit(&store_key, window_secs * 1000, limit)
            .await
        {
            Ok(admission) if admission.allowed => {
                debug!(
                    key = %store_key,
                    remaining = admission.remaining,
                    limit = limit,
                    "Sliding window check passed"
                );
                RateLimitDecision::allowed(limit, admission.remaining)
            }
            Ok(_) => {
                debug!(key = %store_key, limit = limit, "Sliding window limit reached");
                // The oldest marker expires within one window at most
                RateLimitDecision::blocked(limit, window_secs)
            }
            Err(e) => {
                warn!(key = %store_key, "Sliding window check failed open: {}", e);
                RateLimitDecision::allowed(limit, limit)
            }
        }
    }

    /// Remaining admissions without inserting a marker.
    pub async fn remaining(&self, key: &LimitKey, window_secs: u64, limit: u32) -> u32 {
        let store_key = key.to_store_key(&self.key_prefix);

        match self.store.window_count(&store_key, window_secs * 1000).await {
            Ok(count) => limit.saturating_sub(count),
            Err(e) => {
                warn!(key = %store_key, "Sliding window count failed open: {}", e);
                limit
            }
        }
    }

    /// Drop all markers for a key (operator override).
    pub async fn reset(&self, key: &LimitKey) {
        let store_key = key.to_store_key(&self.key_prefix);
        if let Err(e) = self.store.delete(&store_key).await {
            warn!(key = %store_key, "Failed to reset sliding window: {}", e);
        } else {
            debug!(key = %store_key, "Sliding window reset");
        }
    }
}
