//! Shared helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use gatewarden::application::errors::StoreError;
use gatewarden::application::telemetry::NullTelemetrySink;
use gatewarden::config::Config;
use gatewarden::infrastructure::store::{
    BucketDecision, CounterStore, InMemoryCounterStore, WindowAdmission,
};
use gatewarden::AdmissionService;

/// Store double that fails every operation, simulating a full outage.
pub struct FailingStore;

#[async_trait]
impl CounterStore for FailingStore {
    async fn window_admit(
        &self,
        _key: &str,
        _window_ms: u64,
        _limit: u32,
    ) -> Result<WindowAdmission, StoreError> {
        Err(StoreError::Command("simulated outage".into()))
    }

    async fn window_record(&self, _key: &str, _window_ms: u64) -> Result<u32, StoreError> {
        Err(StoreError::Command("simulated outage".into()))
    }

    async fn window_count(&self, _key: &str, _window_ms: u64) -> Result<u32, StoreError> {
        Err(StoreError::Command("simulated outage".into()))
    }

    async fn bucket_try_consume(
        &self,
        _key: &str,
        _capacity: u32,
        _refill_per_sec: f64,
        _ttl_secs: u64,
    ) -> Result<BucketDecision, StoreError> {
        Err(StoreError::Command("simulated outage".into()))
    }

    async fn claim_once(&self, _key: &str, _ttl_secs: u64) -> Result<bool, StoreError> {
        Err(StoreError::Command("simulated outage".into()))
    }

    async fn incr_expiring(&self, _key: &str, _ttl_secs: u64) -> Result<u64, StoreError> {
        Err(StoreError::Command("simulated outage".into()))
    }

    async fn incr_by_expiring(
        &self,
        _key: &str,
        _amount: i64,
        _ttl_secs: u64,
    ) -> Result<i64, StoreError> {
        Err(StoreError::Command("simulated outage".into()))
    }

    async fn get_raw(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Command("simulated outage".into()))
    }

    async fn set_raw(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<(), StoreError> {
        Err(StoreError::Command("simulated outage".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Command("simulated outage".into()))
    }

    async fn cleanup(&self) {}
}

/// Store double that answers correctly but slowly, for deadline tests.
pub struct SlowStore {
    inner: InMemoryCounterStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryCounterStore::new(),
            delay,
        }
    }

    async fn stall(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait]
impl CounterStore for SlowStore {
    async fn window_admit(
        &self,
        key: &str,
        window_ms: u64,
        limit: u32,
    ) -> Result<WindowAdmission, StoreError> {
        self.stall().await;
        self.inner.window_admit(key, window_ms, limit).await
    }

    async fn window_record(&self, key: &str, window_ms: u64) -> Result<u32, StoreError> {
        self.stall().await;
        self.inner.window_record(key, window_ms).await
    }

    async fn window_count(&self, key: &str, window_ms: u64) -> Result<u32, StoreError> {
        self.stall().await;
        self.inner.window_count(key, window_ms).await
    }

    async fn bucket_try_consume(
        &self,
        key: &str,
        capacity: u32,
        refill_per_sec: f64,
        ttl_secs: u64,
    ) -> Result<BucketDecision, StoreError> {
        self.stall().await;
        self.inner
            .bucket_try_consume(key, capacity, refill_per_sec, ttl_secs)
            .await
    }

    async fn claim_once(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        self.stall().await;
        self.inner.claim_once(key, ttl_secs).await
    }

    async fn incr_expiring(&self, key: &str, ttl_secs: u64) -> Result<u64, StoreError> {
        self.stall().await;
        self.inner.incr_expiring(key, ttl_secs).await
    }

    async fn incr_by_expiring(
        &self,
        key: &str,
        amount: i64,
        ttl_secs: u64,
    ) -> Result<i64, StoreError> {
        self.stall().await;
        self.inner.incr_by_expiring(key, amount, ttl_secs).await
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.stall().await;
        self.inner.get_raw(key).await
    }

    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.stall().await;
        self.inner.set_raw(key, value, ttl_secs).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.stall().await;
        self.inner.delete(key).await
    }

    async fn cleanup(&self) {
        self.inner.cleanup().await;
    }
}

/// Admission service over an in-memory store with default configuration.
pub fn in_memory_service() -> AdmissionService {
    service_with(Arc::new(InMemoryCounterStore::new()), Config::default())
}

/// Admission service over an arbitrary store and configuration.
pub fn service_with(store: Arc<dyn CounterStore>, config: Config) -> AdmissionService {
    AdmissionService::with_store(store, Arc::new(NullTelemetrySink), config)
}
