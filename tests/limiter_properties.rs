//! Limiter correctness properties: exactness under concurrency, window
//! expiry, burst-then-steady-state, and fail-open under a store outage.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use common::FailingStore;
use gatewarden::domain::keys::LimitKey;
use gatewarden::infrastructure::limiter::{SlidingWindowLimiter, TokenBucketLimiter};
use gatewarden::infrastructure::nonce::NonceGuard;
use gatewarden::infrastructure::store::{CounterStore, InMemoryCounterStore, current_time_secs};

fn in_memory() -> Arc<dyn CounterStore> {
    Arc::new(InMemoryCounterStore::new())
}

#[tokio::test]
async fn sliding_window_admits_exactly_limit_under_concurrency() {
    let limiter = Arc::new(SlidingWindowLimiter::new(in_memory(), "rl:win"));
    let key = LimitKey::Ip("10.0.0.1".to_string());

    // 10 concurrent callers racing for 3 slots: exactly 3 may win,
    // regardless of arrival order
    let calls = (0..10).map(|_| {
        let limiter = Arc::clone(&limiter);
        let key = key.clone();
        async move { limiter.allow(&key, 60, 3).await }
    });
    let decisions = join_all(calls).await;

    let admitted = decisions.iter().filter(|d| d.allowed).count();
    assert_eq!(admitted, 3);
    assert_eq!(decisions.len() - admitted, 7);
}

#[tokio::test]
async fn sliding_window_exactly_limit_when_limit_callers_race() {
    let limiter = Arc::new(SlidingWindowLimiter::new(in_memory(), "rl:win"));
    let key = LimitKey::Ip("10.0.0.2".to_string());

    let calls = (0..5).map(|_| {
        let limiter = Arc::clone(&limiter);
        let key = key.clone();
        async move { limiter.allow(&key, 60, 5).await }
    });
    let decisions = join_all(calls).await;
    assert!(decisions.iter().all(|d| d.allowed));

    // The (L+1)-th call within the same window is denied
    assert!(!limiter.allow(&key, 60, 5).await.allowed);
}

#[tokio::test]
async fn sliding_window_denial_clears_after_window() {
    let limiter = SlidingWindowLimiter::new(in_memory(), "rl:win");
    let key = LimitKey::Ip("10.0.0.3".to_string());

    assert!(limiter.allow(&key, 1, 1).await.allowed);
    assert!(!limiter.allow(&key, 1, 1).await.allowed);

    // T + W + epsilon
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert!(limiter.allow(&key, 1, 1).await.allowed);
}

#[tokio::test]
async fn concrete_scenario_limit_3_window_60() {
    let limiter = SlidingWindowLimiter::new(in_memory(), "rl:win");
    let key = LimitKey::Ip("10.0.0.1".to_string());

    // 3 rapid calls: allowed with remaining 2, 1, 0
    for expected in [2u32, 1, 0] {
        let decision = limiter.allow(&key, 60, 3).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, expected);
    }

    // 4th immediate call: denied
    assert!(!limiter.allow(&key, 60, 3).await.allowed);
}

#[tokio::test]
async fn token_bucket_burst_then_steady_state() {
    let limiter = TokenBucketLimiter::new(in_memory(), "rl:bucket");
    let key = LimitKey::Ip("10.0.0.4".to_string());

    // Capacity C consecutive immediate calls succeed
    for _ in 0..3 {
        assert!(limiter.try_consume(&key, 3, 2.0).await);
    }
    // The (C+1)-th fails
    assert!(!limiter.try_consume(&key, 3, 2.0).await);

    // After 1/R seconds exactly one more call succeeds
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(limiter.try_consume(&key, 3, 2.0).await);
    assert!(!limiter.try_consume(&key, 3, 2.0).await);
}

#[tokio::test]
async fn token_bucket_does_not_double_spend_under_concurrency() {
    let limiter = Arc::new(TokenBucketLimiter::new(in_memory(), "rl:bucket"));
    let key = LimitKey::Ip("10.0.0.5".to_string());

    // 10 concurrent callers on a 4-token bucket with a negligible refill
    let calls = (0..10).map(|_| {
        let limiter = Arc::clone(&limiter);
        let key = key.clone();
        async move { limiter.try_consume(&key, 4, 0.001).await }
    });
    let outcomes = join_all(calls).await;

    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 4);
}

#[tokio::test]
async fn all_checks_fail_open_during_store_outage() {
    let failing: Arc<dyn CounterStore> = Arc::new(FailingStore);

    let window = SlidingWindowLimiter::new(Arc::clone(&failing), "rl:win");
    let key = LimitKey::Ip("10.0.0.6".to_string());
    let decision = window.allow(&key, 60, 1).await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 1);

    let bucket = TokenBucketLimiter::new(Arc::clone(&failing), "rl:bucket");
    assert!(bucket.try_consume(&key, 1, 1.0).await);
    assert!(bucket.try_consume(&key, 1, 1.0).await);

    let guard = NonceGuard::new(failing);
    let now = current_time_secs() as i64;
    assert!(guard.validate("n", now, 300).await);
    assert!(guard.validate("n", now, 300).await);
}
