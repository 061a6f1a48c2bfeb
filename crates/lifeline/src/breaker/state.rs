// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display, Formatter};
use std::time::{Duration, Instant};

use super::BreakerConfig;

/// The state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected without invoking the operation.
    Open,
    /// Calls pass through as trials that decide whether the circuit closes or reopens.
    HalfOpen,
}

impl CircuitState {
    /// A short `snake_case` label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point-in-time copy of a circuit breaker's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct BreakerSnapshot {
    /// The stored state.
    ///
    /// An open circuit whose timeout has elapsed is still reported as open until the next call
    /// moves it to half-open.
    pub state: CircuitState,
    /// Consecutive failed calls observed while closed.
    pub consecutive_failures: u32,
    /// Consecutive successful trials observed while half-open.
    pub consecutive_successes: u32,
    /// When the circuit last opened. Set only while open.
    pub opened_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnterCircuitResult {
    Accepted { half_opened: bool },
    Rejected { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionResult {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitCircuitResult {
    Unchanged,
    Opened,
    Reopened,
    Closed,
}

/// Breaker bookkeeping. Every method is called with the breaker lock held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

impl BreakerState {
    pub(crate) fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            opened_at: self.opened_at,
        }
    }

    /// Decides whether a call may proceed, moving an expired open circuit to half-open.
    pub(crate) fn enter(&mut self, now: Instant, config: &BreakerConfig) -> EnterCircuitResult {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => EnterCircuitResult::Accepted { half_opened: false },
            CircuitState::Open => {
                let opened_at = self.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);

                if elapsed >= config.get_open_timeout() {
                    self.state = CircuitState::HalfOpen;
                    self.opened_at = None;
                    self.consecutive_successes = 0;
                    EnterCircuitResult::Accepted { half_opened: true }
                } else {
                    EnterCircuitResult::Rejected {
                        remaining: config.get_open_timeout().saturating_sub(elapsed),
                    }
                }
            }
        }
    }

    /// Records the outcome of a call that was accepted by [`enter`][Self::enter].
    pub(crate) fn exit(&mut self, result: ExecutionResult, now: Instant, config: &BreakerConfig) -> ExitCircuitResult {
        match (self.state, result) {
            (CircuitState::Closed, ExecutionResult::Success) => {
                self.consecutive_failures = 0;
                ExitCircuitResult::Unchanged
            }
            (CircuitState::Closed, ExecutionResult::Failure) => {
                self.consecutive_successes = 0;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);

                if self.consecutive_failures >= config.get_failure_threshold() {
                    self.open(now);
                    ExitCircuitResult::Opened
                } else {
                    ExitCircuitResult::Unchanged
                }
            }
            // Outcomes of calls that were admitted before the circuit opened are ignored.
            (CircuitState::Open, _) => ExitCircuitResult::Unchanged,
            (CircuitState::HalfOpen, ExecutionResult::Success) => {
                self.consecutive_failures = 0;
                self.consecutive_successes = self.consecutive_successes.saturating_add(1);

                if self.consecutive_successes >= config.get_success_threshold() {
                    *self = Self::new();
                    ExitCircuitResult::Closed
                } else {
                    ExitCircuitResult::Unchanged
                }
            }
            (CircuitState::HalfOpen, ExecutionResult::Failure) => {
                self.open(now);
                ExitCircuitResult::Reopened
            }
        }
    }

    /// Forces the circuit closed and returns the state it was in.
    pub(crate) fn reset(&mut self) -> CircuitState {
        let previous = self.state;
        *self = Self::new();
        previous
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
    }
}
