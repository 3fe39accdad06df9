//! Rate Limiter Service
//!
//! Coordinates rate limiting across the engine: dispatches each check to
//! the algorithm its policy names, and carries the operator-facing
//! administrative operations that bypass normal admission logic.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info};

use crate::config::{LimitAlgorithm, LimitPolicy, RateLimitConfig};
use crate::domain::admission::RateLimitDecision;
use crate::domain::keys::{LimitKey, prefix};
use crate::infrastructure::store::CounterStore;

use super::sliding_window::SlidingWindowLimiter;
use super::token_bucket::TokenBucketLimiter;

/// Main rate limiter service
pub struct RateLimiterService {
    window: SlidingWindowLimiter,
    bucket: TokenBucketLimiter,
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiterService {
    /// Create with an explicit store backend (also used in tests).
    pub fn with_store(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        let window = SlidingWindowLimiter::new(Arc::clone(&store), prefix::WINDOW);
        let bucket = TokenBucketLimiter::new(Arc::clone(&store), prefix::BUCKET);

        Self {
            window,
            bucket,
            store,
            config,
        }
    }

    /// Check whether rate limiting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Check one event against a policy.
    pub async fn check(&self, key: &LimitKey, policy: &LimitPolicy) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision::allowed(u32::MAX, u32::MAX);
        }

        match policy.algorithm {
            LimitAlgorithm::SlidingWindow => {
                self.window.allow(key, policy.window_secs, policy.qps).await
            }
            LimitAlgorithm::TokenBucket => {
                let capacity = policy.qps + policy.burst_capacity;
                self.bucket.consume(key, capacity, policy.qps as f64).await
            }
        }
    }

    /// Key scoped to one operation, so unrelated policies can never share
    /// a counter. Admin calls targeting pipeline counters address the same
    /// scoped key.
    pub fn operation_key(operation: &str, key: &LimitKey) -> LimitKey {
        LimitKey::Custom(format!("{}:{}", operation, key))
    }

    /// Check the named operation's policy for `key`.
    pub async fn check_operation(&self, key: &LimitKey, operation: &str) -> RateLimitDecision {
        let policy = self.config.policy_for(operation);
        let scoped = Self::operation_key(operation, key);
        self.check(&scoped, policy).await
    }

    /// Operator: clear all rate limit state for a key.
    pub async fn reset_rate_limit(&self, key: &LimitKey) {
        self.window.reset(key).await;
        self.bucket.reset(key).await;
        info!(key = %key, "Rate limit state reset by operator");
    }

    /// Operator: remaining admissions for a key without consuming one.
    pub async fn get_remaining_requests(
        &self,
        key: &LimitKey,
        limit: u32,
        window_secs: u64,
    ) -> u32 {
        self.window.remaining(key, window_secs, limit).await
    }

    /// Start the periodic cleanup task for the in-memory backend.
    pub fn start_cleanup_task(self: Arc<Self>, cleanup_interval: Duration) {
        tokio::spawn(async move {
            let mut interval = interval(cleanup_interval);

            loop {
                interval.tick().await;
                self.store.cleanup().await;
                debug!("Rate limiter cleanup completed");
            }
        });
    }

    /// The underlying store, shared with the other engine components.
    pub fn store(&self) -> Arc<dyn CounterStore> {
        Arc::clone(&self.store)
    }
}
