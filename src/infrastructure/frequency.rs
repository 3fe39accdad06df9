//! Frequency/DDoS detector
//!
//! Tracks request counters per client identity at three granularities:
//! per-second counters catch short bursts and per-hour counters catch
//! sustained abuse that a single window would miss in either direction.
//! Any ceiling breach blacklists the identity for the configured lockout.
//! Lightweight heuristics (known-bad user agents and probing paths) feed a
//! suspicion counter that blacklists past its own threshold.
//!
//! Per identity the states are Unknown -> Normal -> Suspicious ->
//! Blacklisted; blacklisting is terminal until the entry's TTL expires or
//! an operator removes it.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::telemetry::{EnforcementAction, SecurityEvent, TelemetrySink};
use crate::config::FrequencyConfig;
use crate::domain::admission::RejectReason;
use crate::domain::events::{ClientStatus, RequestProfile, ViolationKind};
use crate::domain::keys::prefix;
use crate::infrastructure::blacklist::Blacklist;
use crate::infrastructure::store::CounterStore;

/// The three counting granularities: (suffix, window seconds, label)
const GRANULARITIES: [(&str, u64, &str); 3] =
    [("sec", 1, "per-second"), ("min", 60, "per-minute"), ("hr", 3_600, "per-hour")];

/// Multi-granularity request frequency detector.
pub struct FrequencyDetector {
    store: Arc<dyn CounterStore>,
    blacklist: Arc<Blacklist>,
    sink: Arc<dyn TelemetrySink>,
    config: FrequencyConfig,
}

impl FrequencyDetector {
    pub fn new(
        store: Arc<dyn CounterStore>,
        blacklist: Arc<Blacklist>,
        sink: Arc<dyn TelemetrySink>,
        config: FrequencyConfig,
    ) -> Self {
        Self {
            store,
            blacklist,
            sink,
            config,
        }
    }

    fn counter_key(identity: &str, granularity: &str) -> String {
        format!("{}:{}:{}", prefix::FREQUENCY, granularity, identity)
    }

    fn suspicion_key(identity: &str) -> String {
        format!("{}:heuristic:{}", prefix::SUSPICION, identity)
    }

    fn ceiling(&self, granularity: &str) -> u32 {
        match granularity {
            "sec" => self.config.per_second,
            "min" => self.config.per_minute,
            _ => self.config.per_hour,
        }
    }

    /// Record this request against all granularities and run the
    /// heuristics. Returns the rejection when the identity crossed into
    /// Blacklisted on this request.
    ///
    /// The blacklist itself is consulted by the admission pipeline before
    /// this runs; a ceiling breach here both inserts the entry and rejects
    /// the triggering request.
    pub async fn inspect(&self, profile: &RequestProfile) -> Option<RejectReason> {
        if !self.config.enabled {
            return None;
        }

        for (granularity, window_secs, label) in GRANULARITIES {
            let key = Self::counter_key(&profile.identity, granularity);
            let count = match self.store.window_record(&key, window_secs * 1000).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(
                        identity = %profile.identity,
                        granularity = granularity,
                        "Frequency counter failed open: {}",
                        e
                    );
                    continue;
                }
            };

            let ceiling = self.ceiling(granularity);
            if count > ceiling {
                let reason = format!("{} request ceiling exceeded ({}/{})", label, count, ceiling);
                return Some(
                    self.blacklist_identity(
                        &profile.identity,
                        reason,
                        ViolationKind::RateFlood,
                        count as u64,
                    )
                    .await,
                );
            }
        }

        if self.is_suspicious(profile) {
            let key = Self::suspicion_key(&profile.identity);
            match self
                .store
                .incr_expiring(&key, self.config.suspicion_window_secs)
                .await
            {
                Ok(count) => {
                    debug!(
                        identity = %profile.identity,
                        count = count,
                        "Suspicious request heuristic hit"
                    );
                    self.sink.emit(SecurityEvent::new(
                        &profile.identity,
                        ViolationKind::SuspiciousRequest,
                        count,
                        EnforcementAction::Counted,
                    ));
                    if count >= self.config.suspicion_threshold {
                        let reason = format!(
                            "suspicion threshold exceeded ({} heuristic hits)",
                            count
                        );
                        return Some(
                            self.blacklist_identity(
                                &profile.identity,
                                reason,
                                ViolationKind::SuspiciousRequest,
                                count,
                            )
                            .await,
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        identity = %profile.identity,
                        "Suspicion counter failed open: {}",
                        e
                    );
                }
            }
        }

        None
    }

    async fn blacklist_identity(
        &self,
        identity: &str,
        reason: String,
        kind: ViolationKind,
        count: u64,
    ) -> RejectReason {
        if let Err(e) = self
            .blacklist
            .insert(identity, &reason, self.config.lockout_secs)
            .await
        {
            warn!(identity = %identity, "Failed to persist blacklist entry: {}", e);
        }
        self.sink.emit(SecurityEvent::new(
            identity,
            kind,
            count,
            EnforcementAction::Blacklisted,
        ));
        RejectReason::Blacklisted { reason }
    }

    /// Empty user agents, known attack tools, and probing paths.
    fn is_suspicious(&self, profile: &RequestProfile) -> bool {
        let ua_suspicious = match profile.user_agent.as_deref() {
            None | Some("") => true,
            Some(ua) => {
                let ua = ua.to_ascii_lowercase();
                self.config
                    .bad_user_agents
                    .iter()
                    .any(|bad| ua.contains(bad.as_str()))
            }
        };
        if ua_suspicious {
            return true;
        }

        self.config
            .bad_paths
            .iter()
            .any(|bad| profile.path.contains(bad.as_str()))
    }

    /// Observed standing of an identity, for operator visibility.
    pub async fn status(&self, identity: &str) -> ClientStatus {
        if self.blacklist.check(identity).await.is_some() {
            return ClientStatus::Blacklisted;
        }

        let suspicion = self
            .store
            .get_raw(&Self::suspicion_key(identity))
            .await
            .ok()
            .flatten()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0);
        if suspicion > 0 {
            return ClientStatus::Suspicious;
        }

        let minute_key = Self::counter_key(identity, "min");
        match self.store.window_count(&minute_key, 60 * 1000).await {
            Ok(count) if count > 0 => ClientStatus::Normal,
            _ => ClientStatus::Unknown,
        }
    }
}
