// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::constants::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_OPEN_TIMEOUT, DEFAULT_SUCCESS_THRESHOLD, MIN_THRESHOLD};

/// Thresholds and timing of a [`CircuitBreaker`][super::CircuitBreaker].
///
/// | Setting             | Default |
/// |---------------------|---------|
/// | `failure_threshold` | 3       |
/// | `success_threshold` | 2       |
/// | `open_timeout`      | 30 s    |
///
/// Thresholds below 1 are raised to 1.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use lifeline::breaker::BreakerConfig;
///
/// let config = BreakerConfig::new()
///     .failure_threshold(5)
///     .open_timeout(Duration::from_secs(60));
///
/// assert_eq!(config.get_failure_threshold(), 5);
/// assert_eq!(config.get_success_threshold(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    failure_threshold: u32,
    success_threshold: u32,
    open_timeout: Duration,
}

impl BreakerConfig {
    /// Creates a configuration with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
        }
    }

    /// Sets how many consecutive failed calls open a closed circuit.
    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(MIN_THRESHOLD);
        self
    }

    /// Sets how many consecutive successful half-open trials close the circuit.
    #[must_use]
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(MIN_THRESHOLD);
        self
    }

    /// Sets how long an open circuit rejects calls before it lets a trial through.
    #[must_use]
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Consecutive failed calls that open a closed circuit.
    #[must_use]
    pub fn get_failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Consecutive successful half-open trials that close the circuit.
    #[must_use]
    pub fn get_success_threshold(&self) -> u32 {
        self.success_threshold
    }

    /// How long an open circuit rejects calls.
    #[must_use]
    pub fn get_open_timeout(&self) -> Duration {
        self.open_timeout
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::new()
    }
}
