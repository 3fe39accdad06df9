//! Dragonfly/Redis counter store backend
//!
//! Multi-step operations (prune+count+insert, refill+consume, counter
//! increment with TTL) run as Lua scripts so each executes atomically
//! against the store; nonce claims use `SET NX EX`, which is already a
//! single atomic check-and-set.

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{BucketDecision, CounterStore, WindowAdmission, current_time_millis};
use crate::application::errors::StoreError;

/// Prune expired markers, count, and admit if below the limit.
/// KEYS[1] window key; ARGV: min_score, limit, now_ms, member, window_ms
static WINDOW_ADMIT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
local count = redis.call('ZCARD', KEYS[1])
local limit = tonumber(ARGV[2])
if count < limit then
    redis.call('ZADD', KEYS[1], ARGV[3], ARGV[4])
    redis.call('PEXPIRE', KEYS[1], ARGV[5])
    return {1, limit - count - 1}
end
return {0, 0}
"#,
    )
});

/// Prune, insert unconditionally, return the resulting count.
/// KEYS[1] window key; ARGV: min_score, now_ms, member, window_ms
static WINDOW_RECORD: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
redis.call('ZADD', KEYS[1], ARGV[2], ARGV[3])
redis.call('PEXPIRE', KEYS[1], ARGV[4])
return redis.call('ZCARD', KEYS[1])
"#,
    )
});

/// Prune and count without inserting.
/// KEYS[1] window key; ARGV: min_score
static WINDOW_COUNT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
return redis.call('ZCARD', KEYS[1])
"#,
    )
});

/// Refill by elapsed time, consume one token if at least one is available.
/// KEYS[1] bucket key; ARGV: capacity, refill_per_sec, now_ms, ttl_ms
static BUCKET_CONSUME: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local capacity = tonumber(ARGV[1])
local rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local state = redis.call('HMGET', KEYS[1], 'tokens', 'ts')
local tokens = tonumber(state[1])
local last = tonumber(state[2])
if tokens == nil or last == nil then
    tokens = capacity
    last = now
end
local elapsed = now - last
if elapsed < 0 then
    elapsed = 0
end
tokens = tokens + (elapsed / 1000.0) * rate
if tokens > capacity then
    tokens = capacity
end
local allowed = 0
if tokens >= 1.0 then
    tokens = tokens - 1.0
    allowed = 1
end
redis.call('HSET', KEYS[1], 'tokens', tokens, 'ts', now)
redis.call('PEXPIRE', KEYS[1], ARGV[4])
return {allowed, math.floor(tokens)}
"#,
    )
});

/// INCRBY with TTL attached when the key has none.
/// KEYS[1] counter key; ARGV: amount, ttl_secs
static INCR_EXPIRING: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if redis.call('TTL', KEYS[1]) < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return value
"#,
    )
});

/// Dragonfly/Redis storage backend.
pub struct DragonflyCounterStore {
    connection_manager: Arc<ConnectionManager>,
}

impl DragonflyCounterStore {
    /// Create a new Dragonfly storage backend.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established or the
    /// store does not answer a PING.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| {
            warn!("Failed to create Redis client for counter store: {}", e);
            StoreError::Connection(e.to_string())
        })?;

        let connection_manager = ConnectionManager::new(client).await.map_err(|e| {
            warn!("Failed to create connection manager for counter store: {}", e);
            StoreError::Connection(e.to_string())
        })?;

        // Test connection
        let mut conn = connection_manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| {
                warn!("Failed to ping store at {}: {}", url, e);
                StoreError::Connection(e.to_string())
            })?;

        debug!("Successfully connected to Dragonfly counter store");

        Ok(Self {
            connection_manager: Arc::new(connection_manager),
        })
    }

    fn conn(&self) -> ConnectionManager {
        (*self.connection_manager).clone()
    }

    /// Marker member unique across concurrent callers in the same millisecond.
    fn marker(now_ms: u64) -> String {
        format!("{}-{}", now_ms, Uuid::new_v4().simple())
    }
}

#[async_trait]
impl CounterStore for DragonflyCounterStore {
    async fn window_admit(
        &self,
        key: &str,
        window_ms: u64,
        limit: u32,
    ) -> Result<WindowAdmission, StoreError> {
        let mut conn = self.conn();
        let now = current_time_millis();
        let min_score = now.saturating_sub(window_ms);

        let result: Vec<i64> = WINDOW_ADMIT
            .key(key)
            .arg(min_score)
            .arg(limit)
            .arg(now)
            .arg(Self::marker(now))
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await?;

        Ok(WindowAdmission {
            allowed: result.first().copied().unwrap_or(0) == 1,
            remaining: result.get(1).copied().unwrap_or(0).max(0) as u32,
        })
    }

    async fn window_record(&self, key: &str, window_ms: u64) -> Result<u32, StoreError> {
        let mut conn = self.conn();
        let now = current_time_millis();
        let min_score = now.saturating_sub(window_ms);

        let count: i64 = WINDOW_RECORD
            .key(key)
            .arg(min_score)
            .arg(now)
            .arg(Self::marker(now))
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await?;

        Ok(count.max(0) as u32)
    }

    async fn window_count(&self, key: &str, window_ms: u64) -> Result<u32, StoreError> {
        let mut conn = self.conn();
        let now = current_time_millis();
        let min_score = now.saturating_sub(window_ms);

        let count: i64 = WINDOW_COUNT
            .key(key)
            .arg(min_score)
            .invoke_async(&mut conn)
            .await?;

        Ok(count.max(0) as u32)
    }

    async fn bucket_try_consume(
        &self,
        key: &str,
        capacity: u32,
        refill_per_sec: f64,
        ttl_secs: u64,
    ) -> Result<BucketDecision, StoreError> {
        let mut conn = self.conn();
        let now = current_time_millis();

        let result: Vec<i64> = BUCKET_CONSUME
            .key(key)
            .arg(capacity)
            .arg(refill_per_sec)
            .arg(now)
            .arg(ttl_secs * 1000)
            .invoke_async(&mut conn)
            .await?;

        Ok(BucketDecision {
            allowed: result.first().copied().unwrap_or(0) == 1,
            remaining_tokens: result.get(1).copied().unwrap_or(0).max(0) as u32,
        })
    }

    async fn claim_once(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut conn = self.conn();

        // SET NX EX is a single atomic check-and-set
        let outcome: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(current_time_millis())
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;

        Ok(outcome.is_some())
    }

    async fn incr_expiring(&self, key: &str, ttl_secs: u64) -> Result<u64, StoreError> {
        let mut conn = self.conn();

        let value: i64 = INCR_EXPIRING
            .key(key)
            .arg(1i64)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await?;

        Ok(value.max(0) as u64)
    }

    async fn incr_by_expiring(
        &self,
        key: &str,
        amount: i64,
        ttl_secs: u64,
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn();

        let value: i64 = INCR_EXPIRING
            .key(key)
            .arg(amount)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await?;

        Ok(value)
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();

        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;

        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.conn();

        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<String>(&mut conn)
            .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();

        redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await?;

        Ok(())
    }

    async fn cleanup(&self) {
        // Redis handles TTL-based cleanup automatically
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests against a live store run as integration tests; here we only
    // cover the pure helpers.

    #[test]
    fn test_marker_unique_within_same_millisecond() {
        let a = DragonflyCounterStore::marker(1_700_000_000_000);
        let b = DragonflyCounterStore::marker(1_700_000_000_000);
        assert_ne!(a, b);
        assert!(a.starts_with("1700000000000-"));
    }

    #[tokio::test]
    #[ignore] // Requires a running Dragonfly/Redis instance
    async fn test_window_admit_against_live_store() {
        let store = DragonflyCounterStore::new("redis://127.0.0.1:6379")
            .await
            .expect("store");

        let key = "test:live:window";
        store.delete(key).await.unwrap();

        for i in 0..3 {
            let adm = store.window_admit(key, 60_000, 3).await.unwrap();
            assert!(adm.allowed, "call {} should be admitted", i);
        }
        let adm = store.window_admit(key, 60_000, 3).await.unwrap();
        assert!(!adm.allowed);
    }
}
