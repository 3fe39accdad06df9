//! Movement/speed cheat detector
//!
//! Compares each new position sample against the actor's stored last
//! position: speed = Euclidean distance / elapsed seconds, judged against
//! a per-movement-type ceiling. The stored position is always updated,
//! violation or not, so the next check measures from the true latest
//! state rather than a stale or rejected one.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::MovementConfig;
use crate::domain::events::{MovementSample, ViolationKind};
use crate::domain::keys::prefix;
use crate::infrastructure::escalation::Escalator;
use crate::infrastructure::store::CounterStore;

/// Last known position persisted per actor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct StoredPosition {
    x: f64,
    y: f64,
    z: f64,
    timestamp_ms: u64,
}

impl From<&MovementSample> for StoredPosition {
    fn from(sample: &MovementSample) -> Self {
        Self {
            x: sample.x,
            y: sample.y,
            z: sample.z,
            timestamp_ms: sample.timestamp_ms,
        }
    }
}

/// Result of one movement check.
#[derive(Debug, Clone, Copy)]
pub struct MovementVerdict {
    /// Whether the sample exceeded its ceiling
    pub violation: bool,
    /// Measured speed in units/sec, when a prior position existed
    pub speed: Option<f64>,
    /// Whether this violation crossed the escalation threshold
    pub escalated: bool,
}

impl MovementVerdict {
    fn clean(speed: Option<f64>) -> Self {
        Self {
            violation: false,
            speed,
            escalated: false,
        }
    }
}

/// Speed check over the shared store.
pub struct MovementMonitor {
    store: Arc<dyn CounterStore>,
    escalator: Arc<Escalator>,
    config: MovementConfig,
}

impl MovementMonitor {
    pub fn new(
        store: Arc<dyn CounterStore>,
        escalator: Arc<Escalator>,
        config: MovementConfig,
    ) -> Self {
        Self {
            store,
            escalator,
            config,
        }
    }

    fn position_key(actor: &str) -> String {
        format!("{}:pos:{}", prefix::MOVEMENT, actor)
    }

    /// Check one sample. Store failures fail open (no violation), and the
    /// position update is attempted regardless of the check's outcome.
    pub async fn check(&self, actor: &str, sample: &MovementSample) -> MovementVerdict {
        if !self.config.enabled {
            return MovementVerdict::clean(None);
        }

        let key = Self::position_key(actor);

        let previous = match self.store.get_raw(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<StoredPosition>(&raw) {
                Ok(position) => Some(position),
                Err(e) => {
                    warn!(actor = %actor, "Discarding undecodable stored position: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(actor = %actor, "Position read failed open: {}", e);
                None
            }
        };

        let verdict = match previous {
            Some(last) if sample.timestamp_ms > last.timestamp_ms => {
                let last_sample = MovementSample {
                    x: last.x,
                    y: last.y,
                    z: last.z,
                    timestamp_ms: last.timestamp_ms,
                    movement: sample.movement,
                };
                let distance = sample.distance_to(&last_sample);
                let elapsed_secs = (sample.timestamp_ms - last.timestamp_ms) as f64 / 1000.0;
                let speed = distance / elapsed_secs;
                let ceiling = self.config.ceiling(sample.movement);

                if speed > ceiling {
                    debug!(
                        actor = %actor,
                        speed = speed,
                        ceiling = ceiling,
                        movement = sample.movement.as_str(),
                        "Speed ceiling exceeded"
                    );
                    let escalated = match self
                        .escalator
                        .record_violation(actor, ViolationKind::Speed)
                        .await
                    {
                        Ok(escalated) => escalated,
                        Err(e) => {
                            warn!(actor = %actor, "Violation record failed open: {}", e);
                            false
                        }
                    };
                    MovementVerdict {
                        violation: true,
                        speed: Some(speed),
                        escalated,
                    }
                } else {
                    MovementVerdict::clean(Some(speed))
                }
            }
            // First sighting, or a non-advancing timestamp: nothing to judge
            _ => MovementVerdict::clean(None),
        };

        // Always update, so the next check measures from the latest state
        let position = StoredPosition::from(sample);
        match serde_json::to_string(&position) {
            Ok(payload) => {
                if let Err(e) = self
                    .store
                    .set_raw(&key, &payload, self.config.position_ttl_secs)
                    .await
                {
                    warn!(actor = %actor, "Position update failed: {}", e);
                }
            }
            Err(e) => warn!(actor = %actor, "Position encode failed: {}", e),
        }

        verdict
    }
}
