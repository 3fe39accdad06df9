//! Configuration management
//!
//! Layered configuration in the usual order: `config/default` file, an
//! `ENV`-specific file, `config/local`, then environment variables with the
//! `GATEWARDEN__` prefix. Invalid parameters fail fast at load time; a
//! policy can never reach a request-time check with a zero window or limit.

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::events::{MovementType, TradeKind};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub rate_limit: RateLimitConfig,
    pub nonce: NonceConfig,
    pub frequency: FrequencyConfig,
    pub escalation: EscalationConfig,
    pub movement: MovementConfig,
    pub economy: EconomyConfig,
    pub logging: LoggingConfig,
}

/// Storage backend for all engine counters
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Dragonfly/Redis shared store (recommended for production)
    #[default]
    Dragonfly,
    /// In-memory store (suitable for development/single instance)
    Memory,
}

/// Shared counter store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Connection URL, e.g. "redis://127.0.0.1:6379"
    pub url: String,
    /// Interval for the in-memory cleanup task
    pub cleanup_interval_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Dragonfly,
            url: "redis://127.0.0.1:6379".to_string(),
            cleanup_interval_seconds: 300,
        }
    }
}

/// Which limiting algorithm a policy uses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LimitAlgorithm {
    /// Exact count within a continuously moving window; no bursts
    #[default]
    SlidingWindow,
    /// Steady refill with bounded bursts above the rate
    TokenBucket,
}

/// Scope a policy keys its counters by
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    #[default]
    Ip,
    Player,
    Api,
    Custom,
}

/// Declarative rate limit policy for one protected operation
///
/// The calling layer resolves `key_expression` into a concrete [`crate::domain::keys::LimitKey`]
/// before invoking the limiter; the engine treats the expression as opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitPolicy {
    pub limit_type: LimitType,
    pub key_expression: String,
    /// Steady-state rate. For the sliding window this is the maximum number
    /// of admissions across `window_secs`; for the token bucket it is the
    /// refill rate per second.
    pub qps: u32,
    /// Token bucket capacity (maximum burst above the steady rate)
    pub burst_capacity: u32,
    pub window_secs: u64,
    pub algorithm: LimitAlgorithm,
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self {
            limit_type: LimitType::Ip,
            key_expression: "client.ip".to_string(),
            qps: 50,
            burst_capacity: 10,
            window_secs: 60,
            algorithm: LimitAlgorithm::SlidingWindow,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Policy applied when an operation has no named policy
    pub default_policy: LimitPolicy,
    /// Named per-operation policies
    pub policies: HashMap<String, LimitPolicy>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_policy: LimitPolicy::default(),
            policies: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    /// Policy for the named operation, falling back to the default.
    pub fn policy_for(&self, operation: &str) -> &LimitPolicy {
        self.policies.get(operation).unwrap_or(&self.default_policy)
    }
}

/// Replay guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NonceConfig {
    pub enabled: bool,
    /// Validity window for a one-time token; after expiry a nonce value may
    /// legitimately be reused (accepted risk, bounded by this window)
    pub window_secs: u64,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 300,
        }
    }
}

/// Frequency/DDoS detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyConfig {
    pub enabled: bool,
    /// Per-second request ceiling per identity
    pub per_second: u32,
    /// Per-minute request ceiling per identity
    pub per_minute: u32,
    /// Per-hour request ceiling per identity
    pub per_hour: u32,
    /// Blacklist TTL applied when a ceiling is breached
    pub lockout_secs: u64,
    /// Heuristic hits within the suspicion window that trigger a blacklist
    pub suspicion_threshold: u64,
    pub suspicion_window_secs: u64,
    /// User-agent substrings treated as attack tooling
    pub bad_user_agents: Vec<String>,
    /// Path substrings treated as probing
    pub bad_paths: Vec<String>,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_second: 100,
            per_minute: 2_000,
            per_hour: 20_000,
            lockout_secs: 600,
            suspicion_threshold: 50,
            suspicion_window_secs: 3_600,
            bad_user_agents: vec![
                "sqlmap".to_string(),
                "nikto".to_string(),
                "masscan".to_string(),
                "zgrab".to_string(),
                "python-requests".to_string(),
                "scrapy".to_string(),
            ],
            bad_paths: vec![
                "/wp-admin".to_string(),
                "/phpmyadmin".to_string(),
                "/.env".to_string(),
                "/.git".to_string(),
                "/cgi-bin".to_string(),
                "../".to_string(),
            ],
        }
    }
}

/// Escalation primitive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Window over which violations accumulate
    pub window_secs: u64,
    /// Violation count at which the actor is flagged for investigation
    pub threshold: u64,
    /// Lifetime of the investigation flag record
    pub flag_ttl_secs: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            window_secs: 86_400,
            threshold: 5,
            flag_ttl_secs: 604_800,
        }
    }
}

/// Movement/speed check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub enabled: bool,
    /// Speed ceilings in world units per second
    pub walk_ceiling: f64,
    pub run_ceiling: f64,
    pub mount_ceiling: f64,
    pub fly_ceiling: f64,
    /// Lifetime of the stored last-known position
    pub position_ttl_secs: u64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            walk_ceiling: 5.0,
            run_ceiling: 15.0,
            mount_ceiling: 30.0,
            fly_ceiling: 50.0,
            position_ttl_secs: 86_400,
        }
    }
}

impl MovementConfig {
    /// Speed ceiling for a movement type.
    pub fn ceiling(&self, movement: MovementType) -> f64 {
        match movement {
            MovementType::Walk => self.walk_ceiling,
            MovementType::Run => self.run_ceiling,
            MovementType::Mount => self.mount_ceiling,
            MovementType::Fly => self.fly_ceiling,
        }
    }
}

/// Economic anomaly check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub enabled: bool,
    /// Per-transaction amount ceiling when no per-kind override exists
    pub default_amount_ceiling: i64,
    /// Per-kind amount ceiling overrides, keyed by kind name
    pub amount_ceilings: HashMap<String, i64>,
    /// Transactions allowed per (actor, kind) pair per minute
    pub trades_per_minute: u32,
    /// Transfers between the same two actors before circular trading fires
    pub pair_transfer_limit: u32,
    pub pair_window_secs: u64,
    /// Hourly generation ceiling when no per-resource override exists
    pub default_generation_cap: i64,
    /// Per-resource hourly generation caps, keyed by resource name
    pub generation_caps: HashMap<String, i64>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_amount_ceiling: 1_000_000,
            amount_ceilings: HashMap::new(),
            trades_per_minute: 30,
            pair_transfer_limit: 3,
            pair_window_secs: 300,
            default_generation_cap: 100_000,
            generation_caps: HashMap::new(),
        }
    }
}

impl EconomyConfig {
    /// Amount ceiling for a transaction kind.
    pub fn amount_ceiling(&self, kind: TradeKind) -> i64 {
        self.amount_ceilings
            .get(kind.as_str())
            .copied()
            .unwrap_or(self.default_amount_ceiling)
    }

    /// Theoretical maximum hourly generation for a resource.
    pub fn generation_cap(&self, resource: &str) -> i64 {
        self.generation_caps
            .get(resource)
            .copied()
            .unwrap_or(self.default_generation_cap)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Environment variables use the `GATEWARDEN__` prefix with double
    /// underscore separators, e.g. `GATEWARDEN__STORE__URL`.
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("GATEWARDEN").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_for_falls_back_to_default() {
        let mut config = RateLimitConfig::default();
        config.policies.insert(
            "battle.attack".to_string(),
            LimitPolicy {
                qps: 5,
                ..Default::default()
            },
        );

        assert_eq!(config.policy_for("battle.attack").qps, 5);
        assert_eq!(
            config.policy_for("unknown.op").qps,
            config.default_policy.qps
        );
    }

    #[test]
    fn test_movement_ceilings() {
        let config = MovementConfig::default();
        assert_eq!(config.ceiling(MovementType::Walk), 5.0);
        assert_eq!(config.ceiling(MovementType::Fly), 50.0);
    }

    #[test]
    fn test_economy_ceiling_overrides() {
        let mut config = EconomyConfig::default();
        config.amount_ceilings.insert("transfer".to_string(), 500);

        assert_eq!(config.amount_ceiling(TradeKind::Transfer), 500);
        assert_eq!(
            config.amount_ceiling(TradeKind::Purchase),
            config.default_amount_ceiling
        );
    }
}
