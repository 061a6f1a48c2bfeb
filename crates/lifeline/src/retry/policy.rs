// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::min;
use std::time::Duration;

use super::constants::{DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, MIN_BACKOFF_MULTIPLIER};

/// Exponential backoff schedule for a [`RetryExecutor`][super::RetryExecutor].
///
/// The first attempt runs immediately. The delay before attempt `k` (`k >= 2`) is
/// `initial_delay * backoff_multiplier^(k - 2)`, optionally capped by `max_delay`.
///
/// | Setting              | Default |
/// |----------------------|---------|
/// | `initial_delay`      | 5 s     |
/// | `max_attempts`       | 3       |
/// | `backoff_multiplier` | 2.0     |
/// | `max_delay`          | none    |
///
/// Out-of-range values are clamped rather than rejected: `max_attempts` is at least 1 and
/// `backoff_multiplier` is at least 1.0.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use lifeline::retry::RetryPolicy;
///
/// let policy = RetryPolicy::new()
///     .initial_delay(Duration::from_secs(1))
///     .max_attempts(4)
///     .backoff_multiplier(3.0);
///
/// let delays: Vec<_> = policy.delays().collect();
/// assert_eq!(delays, [Duration::from_secs(1), Duration::from_secs(3), Duration::from_secs(9)]);
/// assert_eq!(policy.total_delay(), Duration::from_secs(13));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    max_attempts: u32,
    backoff_multiplier: f64,
    max_delay: Option<Duration>,
}

impl RetryPolicy {
    /// Creates a policy with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay: None,
        }
    }

    /// Sets the delay before the second attempt.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the total number of attempts, the first one included. Values below 1 become 1.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the growth factor between consecutive delays.
    ///
    /// Values below 1.0 become 1.0. Non-finite values fall back to the default of 2.0.
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = if multiplier.is_finite() {
            multiplier.max(MIN_BACKOFF_MULTIPLIER)
        } else {
            DEFAULT_BACKOFF_MULTIPLIER
        };
        self
    }

    /// Caps every computed delay at `delay`.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// The delay before the second attempt.
    #[must_use]
    pub fn get_initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// The total number of attempts.
    #[must_use]
    pub fn get_max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The growth factor between consecutive delays.
    #[must_use]
    pub fn get_backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// The delay cap, if any.
    #[must_use]
    pub fn get_max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// The delay before the given 1-based attempt. The first attempt has no delay.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        match attempt.checked_sub(2) {
            Some(exponent) => self.compute(exponent),
            None => Duration::ZERO,
        }
    }

    /// The delays between consecutive attempts, `max_attempts - 1` of them.
    #[must_use]
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let policy = *self;
        (2..=self.max_attempts).map(move |attempt| policy.delay_before(attempt))
    }

    /// The time spent waiting when every attempt fails with a transient error.
    #[must_use]
    pub fn total_delay(&self) -> Duration {
        self.delays().fold(Duration::ZERO, Duration::saturating_add)
    }

    fn compute(&self, exponent: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(i32::try_from(exponent).unwrap_or(i32::MAX));
        clamp_to_max(
            secs_to_duration_saturating(self.initial_delay.as_secs_f64() * factor),
            self.max_delay,
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_to_max(d: Duration, max: Option<Duration>) -> Duration {
    max.map_or(d, |m| min(d, m))
}

fn secs_to_duration_saturating(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
