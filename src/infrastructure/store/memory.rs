//! In-memory counter store for development and single-instance deployments
//!
//! Each primitive runs under a map-wide async mutex, which serializes
//! concurrent callers the same way the Lua scripts do against Redis.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::{BucketDecision, CounterStore, WindowAdmission, current_time_millis};
use crate::application::errors::StoreError;

#[derive(Clone)]
struct Expiring<T: Clone> {
    value: T,
    expires_at_ms: u64,
}

#[derive(Clone, Copy)]
struct BucketSlot {
    tokens: f64,
    last_refill_ms: u64,
}

/// In-memory storage backend.
#[derive(Default)]
pub struct InMemoryCounterStore {
    /// Marker timestamps (ms) per window key
    windows: Mutex<HashMap<String, Vec<u64>>>,
    buckets: Mutex<HashMap<String, Expiring<BucketSlot>>>,
    counters: Mutex<HashMap<String, Expiring<i64>>>,
    records: Mutex<HashMap<String, Expiring<String>>>,
    claims: Mutex<HashMap<String, u64>>,
}

impl InMemoryCounterStore {
    /// Create a new in-memory storage backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn window_admit(
        &self,
        key: &str,
        window_ms: u64,
        limit: u32,
    ) -> Result<WindowAdmission, StoreError> {
        let mut windows = self.windows.lock().await;
        let now = current_time_millis();
        let cutoff = now.saturating_sub(window_ms);

        let markers = windows.entry(key.to_string()).or_default();
        // Prune before counting, never after
        markers.retain(|&ts| ts > cutoff);

        let count = markers.len() as u32;
        if count < limit {
            markers.push(now);
            Ok(WindowAdmission {
                allowed: true,
                remaining: limit - count - 1,
            })
        } else {
            Ok(WindowAdmission {
                allowed: false,
                remaining: 0,
            })
        }
    }

    async fn window_record(&self, key: &str, window_ms: u64) -> Result<u32, StoreError> {
        let mut windows = self.windows.lock().await;
        let now = current_time_millis();
        let cutoff = now.saturating_sub(window_ms);

        let markers = windows.entry(key.to_string()).or_default();
        markers.retain(|&ts| ts > cutoff);
        markers.push(now);

        Ok(markers.len() as u32)
    }

    async fn window_count(&self, key: &str, window_ms: u64) -> Result<u32, StoreError> {
        let mut windows = self.windows.lock().await;
        let now = current_time_millis();
        let cutoff = now.saturating_sub(window_ms);

        match windows.get_mut(key) {
            Some(markers) => {
                markers.retain(|&ts| ts > cutoff);
                Ok(markers.len() as u32)
            }
            None => Ok(0),
        }
    }

    async fn bucket_try_consume(
        &self,
        key: &str,
        capacity: u32,
        refill_per_sec: f64,
        ttl_secs: u64,
    ) -> Result<BucketDecision, StoreError> {
        let mut buckets = self.buckets.lock().await;
        let now = current_time_millis();

        let slot = match buckets.get(key) {
            Some(entry) if now < entry.expires_at_ms => entry.value,
            _ => BucketSlot {
                tokens: capacity as f64,
                last_refill_ms: now,
            },
        };

        let elapsed_ms = now.saturating_sub(slot.last_refill_ms);
        let mut tokens =
            (slot.tokens + (elapsed_ms as f64 / 1000.0) * refill_per_sec).min(capacity as f64);

        let allowed = tokens >= 1.0;
        if allowed {
            tokens -= 1.0;
        }

        buckets.insert(
            key.to_string(),
            Expiring {
                value: BucketSlot {
                    tokens,
                    last_refill_ms: now,
                },
                expires_at_ms: now + ttl_secs * 1000,
            },
        );

        Ok(BucketDecision {
            allowed,
            remaining_tokens: tokens.floor().max(0.0) as u32,
        })
    }

    async fn claim_once(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut claims = self.claims.lock().await;
        let now = current_time_millis();

        if let Some(&expires_at) = claims.get(key)
            && now < expires_at
        {
            return Ok(false);
        }

        claims.insert(key.to_string(), now + ttl_secs * 1000);
        Ok(true)
    }

    async fn incr_expiring(&self, key: &str, ttl_secs: u64) -> Result<u64, StoreError> {
        let value = self.incr_by_expiring(key, 1, ttl_secs).await?;
        Ok(value.max(0) as u64)
    }

    async fn incr_by_expiring(
        &self,
        key: &str,
        amount: i64,
        ttl_secs: u64,
    ) -> Result<i64, StoreError> {
        let mut counters = self.counters.lock().await;
        let now = current_time_millis();

        match counters.get_mut(key) {
            Some(entry) if now < entry.expires_at_ms => {
                entry.value += amount;
                Ok(entry.value)
            }
            _ => {
                counters.insert(
                    key.to_string(),
                    Expiring {
                        value: amount,
                        expires_at_ms: now + ttl_secs * 1000,
                    },
                );
                Ok(amount)
            }
        }
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = current_time_millis();

        {
            let records = self.records.lock().await;
            if let Some(entry) = records.get(key)
                && now < entry.expires_at_ms
            {
                return Ok(Some(entry.value.clone()));
            }
        }

        // Counters share the key space with plain records, as GET does for
        // an INCR key in Redis
        let counters = self.counters.lock().await;
        if let Some(entry) = counters.get(key)
            && now < entry.expires_at_ms
        {
            return Ok(Some(entry.value.to_string()));
        }
        Ok(None)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        records.insert(
            key.to_string(),
            Expiring {
                value: value.to_string(),
                expires_at_ms: current_time_millis() + ttl_secs * 1000,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.windows.lock().await.remove(key);
        self.buckets.lock().await.remove(key);
        self.counters.lock().await.remove(key);
        self.records.lock().await.remove(key);
        self.claims.lock().await.remove(key);
        Ok(())
    }

    async fn cleanup(&self) {
        let now = current_time_millis();

        {
            // No window is longer than a day; older markers are dead weight
            let mut windows = self.windows.lock().await;
            windows.retain(|_, markers| {
                markers.retain(|&ts| ts + 86_400_000 > now);
                !markers.is_empty()
            });
        }
        {
            let mut buckets = self.buckets.lock().await;
            buckets.retain(|_, entry| entry.expires_at_ms > now);
        }
        {
            let mut counters = self.counters.lock().await;
            counters.retain(|_, entry| entry.expires_at_ms > now);
        }
        {
            let mut records = self.records.lock().await;
            records.retain(|_, entry| entry.expires_at_ms > now);
        }
        {
            let mut claims = self.claims.lock().await;
            claims.retain(|_, &mut expires_at| expires_at > now);
        }

        debug!("Completed counter store cleanup");
    }
}
