//! Admission pipeline
//!
//! One inbound unit of work passes through: blacklist check, nonce/replay
//! check when the action carries a one-time token, rate limit per the
//! resolved policy, frequency bookkeeping, then the behavioral detectors.
//! Every stage catches its own store failures and fails open; an
//! infrastructure outage is invisible to the caller.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, StoreBackend};
use crate::domain::admission::{AdmissionOutcome, InboundAction, RejectReason};
use crate::infrastructure::anomaly::{EconomyMonitor, MovementMonitor};
use crate::infrastructure::blacklist::Blacklist;
use crate::infrastructure::escalation::Escalator;
use crate::infrastructure::frequency::FrequencyDetector;
use crate::infrastructure::limiter::RateLimiterService;
use crate::infrastructure::nonce::{NonceGuard, NonceVerdict};
use crate::infrastructure::store::{CounterStore, DragonflyCounterStore, InMemoryCounterStore};

use super::telemetry::TelemetrySink;

/// The engine's front door: admits, throttles, or rejects inbound actions.
pub struct AdmissionService {
    blacklist: Arc<Blacklist>,
    nonce: NonceGuard,
    limiter: Arc<RateLimiterService>,
    frequency: FrequencyDetector,
    movement: MovementMonitor,
    economy: EconomyMonitor,
    escalator: Arc<Escalator>,
    store: Arc<dyn CounterStore>,
    config: Config,
}

impl AdmissionService {
    /// Build the service on the configured store backend, falling back to
    /// in-memory when the shared store is unreachable.
    pub async fn connect(config: Config, sink: Arc<dyn TelemetrySink>) -> Self {
        let store: Arc<dyn CounterStore> = match config.store.backend {
            StoreBackend::Dragonfly => match DragonflyCounterStore::new(&config.store.url).await {
                Ok(store) => {
                    info!("Admission engine using Dragonfly store at {}", config.store.url);
                    Arc::new(store)
                }
                Err(e) => {
                    warn!(
                        "Failed to connect to Dragonfly, falling back to in-memory store: {}",
                        e
                    );
                    Arc::new(InMemoryCounterStore::new())
                }
            },
            StoreBackend::Memory => {
                info!("Admission engine using in-memory store");
                Arc::new(InMemoryCounterStore::new())
            }
        };

        Self::with_store(store, sink, config)
    }

    /// Build with an explicit store backend (also used in tests).
    pub fn with_store(
        store: Arc<dyn CounterStore>,
        sink: Arc<dyn TelemetrySink>,
        config: Config,
    ) -> Self {
        let blacklist = Arc::new(Blacklist::new(Arc::clone(&store)));
        let escalator = Arc::new(Escalator::new(
            Arc::clone(&store),
            Arc::clone(&sink),
            config.escalation.clone(),
        ));
        let limiter = Arc::new(RateLimiterService::with_store(
            Arc::clone(&store),
            config.rate_limit.clone(),
        ));
        let frequency = FrequencyDetector::new(
            Arc::clone(&store),
            Arc::clone(&blacklist),
            Arc::clone(&sink),
            config.frequency.clone(),
        );
        let movement = MovementMonitor::new(
            Arc::clone(&store),
            Arc::clone(&escalator),
            config.movement.clone(),
        );
        let economy = EconomyMonitor::new(
            Arc::clone(&store),
            Arc::clone(&escalator),
            config.economy.clone(),
        );
        let nonce = NonceGuard::new(Arc::clone(&store));

        Self {
            blacklist,
            nonce,
            limiter,
            frequency,
            movement,
            economy,
            escalator,
            store,
            config,
        }
    }

    /// Start the periodic cleanup task for the in-memory backend; Redis
    /// expires keys on its own.
    pub fn start_cleanup_task(self: &Arc<Self>) {
        let store = Arc::clone(&self.store);
        let cleanup_interval = Duration::from_secs(self.config.store.cleanup_interval_seconds);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);

            loop {
                interval.tick().await;
                store.cleanup().await;
            }
        });
    }

    /// Decide one inbound action.
    pub async fn admit(&self, action: &InboundAction) -> AdmissionOutcome {
        // Blacklist first, before any other check
        if let Some(entry) = self.blacklist.check(&action.identity).await {
            return AdmissionOutcome::Rejected {
                reason: RejectReason::Blacklisted {
                    reason: entry.reason,
                },
            };
        }

        // Replay guard, when the action carries a one-time token
        if self.config.nonce.enabled {
            match &action.nonce {
                None if action.nonce_required => {
                    return AdmissionOutcome::Rejected {
                        reason: RejectReason::MissingNonce,
                    };
                }
                None => {}
                Some(envelope) => {
                    let verdict = self
                        .nonce
                        .check(
                            &envelope.value,
                            envelope.client_timestamp,
                            self.config.nonce.window_secs,
                        )
                        .await;
                    match verdict {
                        NonceVerdict::Accepted => {}
                        NonceVerdict::Stale => {
                            return AdmissionOutcome::Rejected {
                                reason: RejectReason::StaleTimestamp,
                            };
                        }
                        NonceVerdict::Replayed => {
                            return AdmissionOutcome::Rejected {
                                reason: RejectReason::ReplayDetected,
                            };
                        }
                    }
                }
            }
        }

        // Rate limit per the resolved policy
        let operation = action.operation.as_deref().unwrap_or("default");
        let decision = self
            .limiter
            .check_operation(&action.limit_key, operation)
            .await;
        if !decision.allowed {
            return AdmissionOutcome::Rejected {
                reason: RejectReason::RateLimited {
                    limit: decision.limit,
                    retry_after: decision.retry_after,
                },
            };
        }

        // Frequency bookkeeping; may transition the identity to Blacklisted
        if let Some(profile) = &action.request
            && let Some(reason) = self.frequency.inspect(profile).await
        {
            return AdmissionOutcome::Rejected { reason };
        }

        // Behavioral detectors: escalation bookkeeping only, never a
        // rejection of the triggering action
        if let Some(movement) = &action.movement {
            self.movement.check(&movement.actor, &movement.sample).await;
        }
        if let Some(trade) = &action.trade {
            self.economy.inspect(trade).await;
        }

        AdmissionOutcome::Allowed {
            rate_limit: Some(decision),
        }
    }

    /// Decide with a caller-supplied deadline. A deadline that elapses
    /// fails open, like any other infrastructure failure.
    pub async fn admit_with_deadline(
        &self,
        action: &InboundAction,
        deadline: Duration,
    ) -> AdmissionOutcome {
        match tokio::time::timeout(deadline, self.admit(action)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    identity = %action.identity,
                    deadline_ms = deadline.as_millis() as u64,
                    "Admission check timed out, failing open"
                );
                AdmissionOutcome::Allowed { rate_limit: None }
            }
        }
    }

    /// Rate limiter, for the administrative operations.
    pub fn limiter(&self) -> &RateLimiterService {
        &self.limiter
    }

    /// Blacklist, for the administrative operations.
    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    /// Frequency detector, for operator status reads.
    pub fn frequency(&self) -> &FrequencyDetector {
        &self.frequency
    }

    /// Movement monitor.
    pub fn movement(&self) -> &MovementMonitor {
        &self.movement
    }

    /// Economy monitor.
    pub fn economy(&self) -> &EconomyMonitor {
        &self.economy
    }

    /// Escalation primitive, for review tooling.
    pub fn escalator(&self) -> &Escalator {
        &self.escalator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::telemetry::NullTelemetrySink;
    use crate::domain::admission::NonceEnvelope;
    use crate::domain::keys::LimitKey;
    use crate::infrastructure::store::current_time_secs;

    fn service() -> AdmissionService {
        AdmissionService::with_store(
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(NullTelemetrySink),
            Config::default(),
        )
    }

    fn action(identity: &str) -> InboundAction {
        InboundAction::new(identity, LimitKey::Ip(identity.to_string()))
    }

    #[tokio::test]
    async fn test_plain_action_is_allowed() {
        let service = service();
        let outcome = service.admit(&action("10.0.0.1")).await;
        assert!(outcome.is_allowed());
    }

    #[tokio::test]
    async fn test_blacklisted_identity_rejected_before_anything_else() {
        let service = service();
        service
            .blacklist()
            .insert("10.0.0.1", "manual block", 600)
            .await
            .unwrap();

        let outcome = service.admit(&action("10.0.0.1")).await;
        match outcome {
            AdmissionOutcome::Rejected {
                reason: RejectReason::Blacklisted { reason },
            } => assert_eq!(reason, "manual block"),
            other => panic!("expected blacklist rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_required_nonce_rejected() {
        let service = service();
        let mut action = action("10.0.0.1");
        action.nonce_required = true;

        let outcome = service.admit(&action).await;
        match outcome {
            AdmissionOutcome::Rejected { reason } => {
                assert_eq!(reason, RejectReason::MissingNonce)
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_replayed_nonce_rejected() {
        let service = service();
        let now = current_time_secs() as i64;

        let mut first = action("10.0.0.1");
        first.nonce = Some(NonceEnvelope {
            value: "one-shot".to_string(),
            client_timestamp: now,
        });
        assert!(service.admit(&first).await.is_allowed());

        let outcome = service.admit(&first).await;
        match outcome {
            AdmissionOutcome::Rejected { reason } => {
                assert_eq!(reason, RejectReason::ReplayDetected)
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_rejection_carries_metadata() {
        let mut config = Config::default();
        config.rate_limit.default_policy.qps = 1;
        config.rate_limit.default_policy.window_secs = 60;

        let service = AdmissionService::with_store(
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(NullTelemetrySink),
            config,
        );

        assert!(service.admit(&action("10.0.0.1")).await.is_allowed());
        let outcome = service.admit(&action("10.0.0.1")).await;
        match outcome {
            AdmissionOutcome::Rejected {
                reason: RejectReason::RateLimited { limit, retry_after },
            } => {
                assert_eq!(limit, 1);
                assert!(retry_after.is_some());
            }
            other => panic!("expected rate limit rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deadline_elapse_fails_open() {
        let service = service();
        let outcome = service
            .admit_with_deadline(&action("10.0.0.1"), Duration::from_nanos(1))
            .await;
        assert!(outcome.is_allowed());
    }
}
