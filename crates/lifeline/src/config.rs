// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Serializable configuration.

use std::time::Duration;

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

use crate::ResilienceContext;
use crate::breaker::BreakerConfig;
use crate::health::{DEFAULT_DEPENDENCY_DOWN_THRESHOLD, DEFAULT_PROBE_INTERVAL, HealthProber};
use crate::retry::RetryPolicy;

/// Resilience settings of an agent, typically loaded from a configuration file.
///
/// Every field is optional and falls back to the defaults of [`RetryPolicy`], [`BreakerConfig`]
/// and [`HealthProber`]. Durations use ISO 8601 notation, for example `"PT5S"`.
///
/// Unlike the builders, which clamp, the conversion methods reject out-of-range values.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "serde")]
/// # {
/// use std::time::Duration;
///
/// use lifeline::config::LifelineConfig;
///
/// let config: LifelineConfig = serde_json::from_str(
///     r#"{
///         "retry": { "initial_delay": "PT1S", "max_attempts": 4 },
///         "breaker": { "open_timeout": "PT45S" }
///     }"#,
/// )?;
///
/// let policy = config.retry_policy()?;
/// assert_eq!(policy.get_initial_delay(), Duration::from_secs(1));
/// assert_eq!(policy.get_max_attempts(), 4);
///
/// let breaker = config.breaker_config()?;
/// assert_eq!(breaker.get_open_timeout(), Duration::from_secs(45));
/// assert_eq!(breaker.get_failure_threshold(), 3);
/// # }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifelineConfig {
    /// Retry settings.
    pub retry: RetrySection,
    /// Circuit breaker settings.
    pub breaker: BreakerSection,
    /// Health probe settings.
    pub health: HealthSection,
}

/// The `retry` section of [`LifelineConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    /// Delay before the second attempt.
    pub initial_delay: SignedDuration,
    /// Total number of attempts. At least 1.
    pub max_attempts: u32,
    /// Growth factor between delays. Finite and at least 1.0.
    pub backoff_multiplier: f64,
    /// Optional cap on every delay.
    pub max_delay: Option<SignedDuration>,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();

        Self {
            initial_delay: signed(policy.get_initial_delay()),
            max_attempts: policy.get_max_attempts(),
            backoff_multiplier: policy.get_backoff_multiplier(),
            max_delay: policy.get_max_delay().map(signed),
        }
    }
}

/// The `breaker` section of [`LifelineConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerSection {
    /// Consecutive failed calls that open the circuit. At least 1.
    pub failure_threshold: u32,
    /// Consecutive successful trials that close the circuit. At least 1.
    pub success_threshold: u32,
    /// How long the circuit stays open before a trial call.
    pub open_timeout: SignedDuration,
}

impl Default for BreakerSection {
    fn default() -> Self {
        let config = BreakerConfig::default();

        Self {
            failure_threshold: config.get_failure_threshold(),
            success_threshold: config.get_success_threshold(),
            open_timeout: signed(config.get_open_timeout()),
        }
    }
}

/// The `health` section of [`LifelineConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthSection {
    /// Time between two probes of the same service. Must be positive.
    pub interval: SignedDuration,
    /// Consecutive unhealthy probes that report a service as down. At least 1.
    pub dependency_down_threshold: u32,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            interval: signed(DEFAULT_PROBE_INTERVAL),
            dependency_down_threshold: DEFAULT_DEPENDENCY_DOWN_THRESHOLD,
        }
    }
}

/// A configuration value is out of range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A duration is negative.
    #[error("'{field}' must not be negative, got {value}")]
    NegativeDuration {
        /// The offending field.
        field: &'static str,
        /// The configured value.
        value: SignedDuration,
    },

    /// The probe interval is zero or negative.
    #[error("'health.interval' must be positive, got {0}")]
    NonPositiveInterval(SignedDuration),

    /// A count is below its minimum.
    #[error("'{field}' must be at least {min}, got {value}")]
    BelowMinimum {
        /// The offending field.
        field: &'static str,
        /// The smallest accepted value.
        min: u32,
        /// The configured value.
        value: u32,
    },

    /// The backoff multiplier is not a finite number of at least 1.0.
    #[error("'retry.backoff_multiplier' must be a finite number of at least 1.0, got {0}")]
    InvalidMultiplier(f64),
}

impl LifelineConfig {
    /// Builds the retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value of the `retry` section is out of range.
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let section = &self.retry;

        if !section.backoff_multiplier.is_finite() || section.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(section.backoff_multiplier));
        }

        let mut policy = RetryPolicy::new()
            .initial_delay(unsigned("retry.initial_delay", section.initial_delay)?)
            .max_attempts(at_least("retry.max_attempts", section.max_attempts, 1)?)
            .backoff_multiplier(section.backoff_multiplier);

        if let Some(max_delay) = section.max_delay {
            policy = policy.max_delay(unsigned("retry.max_delay", max_delay)?);
        }

        Ok(policy)
    }

    /// Builds the circuit breaker configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value of the `breaker` section is out of range.
    pub fn breaker_config(&self) -> Result<BreakerConfig, ConfigError> {
        let section = &self.breaker;

        Ok(BreakerConfig::new()
            .failure_threshold(at_least("breaker.failure_threshold", section.failure_threshold, 1)?)
            .success_threshold(at_least("breaker.success_threshold", section.success_threshold, 1)?)
            .open_timeout(unsigned("breaker.open_timeout", section.open_timeout)?))
    }

    /// The time between two probes of the same service.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonPositiveInterval`] when the interval is not positive.
    pub fn probe_interval(&self) -> Result<Duration, ConfigError> {
        let interval = self.health.interval;

        if interval.is_zero() || interval.is_negative() {
            return Err(ConfigError::NonPositiveInterval(interval));
        }

        unsigned("health.interval", interval)
    }

    /// Creates a health prober for `context` with the configured down threshold.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value of the `health` section is out of range.
    pub fn health_prober(&self, context: &ResilienceContext) -> Result<HealthProber, ConfigError> {
        let threshold = at_least("health.dependency_down_threshold", self.health.dependency_down_threshold, 1)?;

        Ok(HealthProber::new(context).dependency_down_threshold(threshold))
    }
}

fn signed(duration: Duration) -> SignedDuration {
    SignedDuration::try_from(duration).unwrap_or(SignedDuration::MAX)
}

fn unsigned(field: &'static str, value: SignedDuration) -> Result<Duration, ConfigError> {
    if value.is_negative() {
        return Err(ConfigError::NegativeDuration { field, value });
    }

    Ok(value.unsigned_abs())
}

fn at_least(field: &'static str, value: u32, min: u32) -> Result<u32, ConfigError> {
    if value < min {
        return Err(ConfigError::BelowMinimum { field, min, value });
    }

    Ok(value)
}
