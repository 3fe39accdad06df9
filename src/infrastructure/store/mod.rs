//! Shared counter store
//!
//! All engine state is ephemeral and lives in the store; no component keeps
//! authoritative state in local memory. The trait exposes operation-level
//! atomic primitives rather than raw state reads and writes: prune+count+
//! insert, refill+consume, and check-and-set each execute as a single
//! serialized step per key, which is what makes two racing callers unable
//! to both take the last slot.
//!
//! Backends:
//! - Dragonfly/Redis for distributed, production use
//! - In-memory for development and single-instance deployments

pub mod dragonfly;
pub mod memory;

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::application::errors::StoreError;

pub use dragonfly::DragonflyCounterStore;
pub use memory::InMemoryCounterStore;

/// Outcome of an atomic sliding-window admission attempt.
#[derive(Debug, Clone, Copy)]
pub struct WindowAdmission {
    /// Whether a marker was inserted (the event was admitted)
    pub allowed: bool,
    /// Slots left in the window after this attempt
    pub remaining: u32,
}

/// Outcome of an atomic token bucket consumption attempt.
#[derive(Debug, Clone, Copy)]
pub struct BucketDecision {
    /// Whether a token was consumed
    pub allowed: bool,
    /// Whole tokens left in the bucket after this attempt
    pub remaining_tokens: u32,
}

/// Atomic primitives over the shared key-value store.
///
/// Within a single key the store serializes concurrent updates; that is the
/// only ordering guarantee the engine relies on. Every first write to a key
/// sets its TTL; denial-relevant updates may extend a TTL but never shorten
/// one.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically discard markers older than the window, count the rest,
    /// and insert a marker at now if the count is below `limit`.
    async fn window_admit(
        &self,
        key: &str,
        window_ms: u64,
        limit: u32,
    ) -> Result<WindowAdmission, StoreError>;

    /// Atomically prune, insert a marker unconditionally, and return the
    /// resulting count. Used by detectors that count without gating.
    async fn window_record(&self, key: &str, window_ms: u64) -> Result<u32, StoreError>;

    /// Atomically prune and count without inserting.
    async fn window_count(&self, key: &str, window_ms: u64) -> Result<u32, StoreError>;

    /// Atomically refill a token bucket by elapsed time and consume one
    /// token if available. Tokens stay within `[0, capacity]`.
    async fn bucket_try_consume(
        &self,
        key: &str,
        capacity: u32,
        refill_per_sec: f64,
        ttl_secs: u64,
    ) -> Result<BucketDecision, StoreError>;

    /// Atomically record `key` if it does not exist yet, with the given
    /// TTL. Returns `true` exactly once per TTL window.
    async fn claim_once(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    /// Atomically increment a counter, setting the TTL when the key has
    /// none. Returns the value after the increment.
    async fn incr_expiring(&self, key: &str, ttl_secs: u64) -> Result<u64, StoreError>;

    /// `incr_expiring` by an arbitrary amount, for cumulative totals.
    async fn incr_by_expiring(
        &self,
        key: &str,
        amount: i64,
        ttl_secs: u64,
    ) -> Result<i64, StoreError>;

    /// Get a raw string record.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a raw string record with TTL.
    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Delete a key.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Cleanup expired entries (for the in-memory backend).
    async fn cleanup(&self);
}

/// Get current time in milliseconds since Unix epoch.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Get current time in seconds since Unix epoch.
pub fn current_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}
