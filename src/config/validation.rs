//! Configuration validation module
//!
//! Invalid policy parameters are a setup-time failure, never a
//! request-time one.

use super::{
    Config, EconomyConfig, EscalationConfig, FrequencyConfig, LimitAlgorithm, LimitPolicy,
    MovementConfig, NonceConfig, RateLimitConfig, StoreBackend, StoreConfig,
};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Store configuration error: {message}")]
    Store { message: String },

    #[error("Rate limit configuration error: {message}")]
    RateLimit { message: String },

    #[error("Nonce configuration error: {message}")]
    Nonce { message: String },

    #[error("Frequency configuration error: {message}")]
    Frequency { message: String },

    #[error("Escalation configuration error: {message}")]
    Escalation { message: String },

    #[error("Movement configuration error: {message}")]
    Movement { message: String },

    #[error("Economy configuration error: {message}")]
    Economy { message: String },
}

impl ValidationError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }

    pub fn nonce(message: impl Into<String>) -> Self {
        Self::Nonce {
            message: message.into(),
        }
    }

    pub fn frequency(message: impl Into<String>) -> Self {
        Self::Frequency {
            message: message.into(),
        }
    }

    pub fn escalation(message: impl Into<String>) -> Self {
        Self::Escalation {
            message: message.into(),
        }
    }

    pub fn movement(message: impl Into<String>) -> Self {
        Self::Movement {
            message: message.into(),
        }
    }

    pub fn economy(message: impl Into<String>) -> Self {
        Self::Economy {
            message: message.into(),
        }
    }
}

impl Validate for StoreConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.backend == StoreBackend::Dragonfly && self.url.trim().is_empty() {
            return Err(ValidationError::store(
                "Store URL must be set for the dragonfly backend",
            ));
        }
        if self.cleanup_interval_seconds == 0 {
            return Err(ValidationError::store(
                "Cleanup interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn validate_policy(name: &str, policy: &LimitPolicy) -> Result<(), ValidationError> {
    if policy.qps == 0 {
        return Err(ValidationError::rate_limit(format!(
            "Policy '{}': qps must be greater than zero",
            name
        )));
    }
    if policy.window_secs == 0 {
        return Err(ValidationError::rate_limit(format!(
            "Policy '{}': window must be greater than zero",
            name
        )));
    }
    if policy.algorithm == LimitAlgorithm::TokenBucket && policy.burst_capacity == 0 {
        return Err(ValidationError::rate_limit(format!(
            "Policy '{}': token bucket requires a non-zero burst capacity",
            name
        )));
    }
    Ok(())
}

impl Validate for RateLimitConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_policy("default", &self.default_policy)?;
        for (name, policy) in &self.policies {
            validate_policy(name, policy)?;
        }
        Ok(())
    }
}

impl Validate for NonceConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.window_secs == 0 {
            return Err(ValidationError::nonce(
                "Replay window must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Validate for FrequencyConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        if self.per_second == 0 || self.per_minute == 0 || self.per_hour == 0 {
            return Err(ValidationError::frequency(
                "Request ceilings must be greater than zero",
            ));
        }
        if self.lockout_secs == 0 {
            return Err(ValidationError::frequency(
                "Lockout duration must be greater than zero",
            ));
        }
        if self.suspicion_threshold == 0 || self.suspicion_window_secs == 0 {
            return Err(ValidationError::frequency(
                "Suspicion threshold and window must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Validate for EscalationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.threshold == 0 {
            return Err(ValidationError::escalation(
                "Escalation threshold must be greater than zero",
            ));
        }
        if self.window_secs == 0 || self.flag_ttl_secs == 0 {
            return Err(ValidationError::escalation(
                "Escalation windows must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Validate for MovementConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        let ceilings = [
            self.walk_ceiling,
            self.run_ceiling,
            self.mount_ceiling,
            self.fly_ceiling,
        ];
        if ceilings.iter().any(|c| *c <= 0.0 || !c.is_finite()) {
            return Err(ValidationError::movement(
                "Speed ceilings must be positive and finite",
            ));
        }
        if self.position_ttl_secs == 0 {
            return Err(ValidationError::movement(
                "Position TTL must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Validate for EconomyConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        if self.default_amount_ceiling <= 0 || self.default_generation_cap <= 0 {
            return Err(ValidationError::economy(
                "Amount and generation ceilings must be greater than zero",
            ));
        }
        if self.trades_per_minute == 0 {
            return Err(ValidationError::economy(
                "Trade frequency ceiling must be greater than zero",
            ));
        }
        if self.pair_window_secs == 0 {
            return Err(ValidationError::economy(
                "Pair window must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.store.validate()?;
        self.rate_limit.validate()?;
        self.nonce.validate()?;
        self.frequency.validate()?;
        self.escalation.validate()?;
        self.movement.validate()?;
        self.economy.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_window_is_rejected() {
        let mut config = RateLimitConfig::default();
        config.default_policy.window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_qps_is_rejected() {
        let mut config = RateLimitConfig::default();
        config.default_policy.qps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_bucket_requires_burst_capacity() {
        let mut config = RateLimitConfig::default();
        config.default_policy.algorithm = LimitAlgorithm::TokenBucket;
        config.default_policy.burst_capacity = 0;
        assert!(config.validate().is_err());

        config.default_policy.burst_capacity = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_named_policy_is_validated() {
        let mut config = RateLimitConfig::default();
        config.policies.insert(
            "broken".to_string(),
            LimitPolicy {
                qps: 0,
                ..Default::default()
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_sections_skip_validation() {
        let mut config = Config::default();
        config.movement.enabled = false;
        config.movement.walk_ceiling = -1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_store_url_rejected_for_dragonfly() {
        let mut config = StoreConfig::default();
        config.url = "  ".to_string();
        assert!(config.validate().is_err());

        config.backend = StoreBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_escalation_threshold_rejected() {
        let mut config = EscalationConfig::default();
        config.threshold = 0;
        assert!(config.validate().is_err());
    }
}
