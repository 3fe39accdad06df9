//! Token Bucket Rate Limiter
//!
//! Tokens accumulate at a steady refill rate up to the bucket capacity and
//! each admitted event consumes one. Refill and consumption are a single
//! atomic read-modify-write per key, so concurrent callers cannot
//! double-spend a token. Tolerates short bursts above the steady rate, in
//! contrast with the sliding window's hard cap.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::admission::RateLimitDecision;
use crate::domain::keys::LimitKey;
use crate::infrastructure::store::CounterStore;

/// Token bucket rate limiter
pub struct TokenBucketLimiter {
    store: Arc<dyn CounterStore>,
    key_prefix: String,
}

impl TokenBucketLimiter {
    /// Create a new token bucket rate limiter
    pub fn new(store: Arc<dyn CounterStore>, key_prefix: &str) -> Self {
        Self {
            store,
            key_prefix: key_prefix.to_string(),
        }
    }

    /// Consume one token, reporting the remaining whole tokens for
    /// response metadata.
    ///
    /// Store failures fail open.
    pub async fn consume(
        &self,
        key: &LimitKey,
        capacity: u32,
        refill_per_sec: f64,
    ) -> RateLimitDecision {
        let store_key = key.to_store_key(&self.key_prefix);
        let ttl_secs = Self::state_ttl(capacity, refill_per_sec);

        match self
            .store
            .bucket_try_consume(&store_key, capacity, refill_per_sec, ttl_secs)
            .await
        {
            Ok(decision) if decision.allowed => {
                debug!(
                    key = %store_key,
                    remaining = decision.remaining_tokens,
                    capacity = capacity,
                    "Token bucket check passed"
                );
                RateLimitDecision::allowed(capacity, decision.remaining_tokens)
            }
            Ok(_) => {
                debug!(key = %store_key, capacity = capacity, "Token bucket empty");
                // One token refills within 1/R seconds
                RateLimitDecision::blocked(capacity, (1.0 / refill_per_sec).ceil().max(1.0) as u64)
            }
            Err(e) => {
                warn!(key = %store_key, "Token bucket check failed open: {}", e);
                RateLimitDecision::allowed(capacity, capacity)
            }
        }
    }

    /// Try to consume one token. Returns `true` when the event is admitted.
    pub async fn try_consume(&self, key: &LimitKey, capacity: u32, refill_per_sec: f64) -> bool {
        self.consume(key, capacity, refill_per_sec).await.allowed
    }

    /// Drop the bucket state for a key (operator override).
    pub async fn reset(&self, key: &LimitKey) {
        let store_key = key.to_store_key(&self.key_prefix);
        if let Err(e) = self.store.delete(&store_key).await {
            warn!(key = %store_key, "Failed to reset token bucket: {}", e);
        }
    }

    /// State TTL: twice the time an empty bucket needs to refill, with a
    /// one minute floor so short-lived buckets still get cleaned up lazily.
    fn state_ttl(capacity: u32, refill_per_sec: f64) -> u64 {
        let time_to_full = (capacity as f64 / refill_per_sec).ceil() as u64;
        (time_to_full * 2).max(60)
    }
}
