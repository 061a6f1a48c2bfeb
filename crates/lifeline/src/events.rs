// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display, Formatter};
use std::time::{Duration, SystemTime};

use crate::breaker::CircuitState;
use crate::fn_wrapper::define_fn_wrapper;
use crate::health::HealthProbeResult;
use crate::{ErrorClassification, ServiceName};

/// How urgently an event needs a human's attention.
///
/// Alerting collaborators route on this value, for example paging on [`Severity::Critical`]
/// and only logging [`Severity::Info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Normal operation, including recovery.
    Info,
    /// Something went wrong but was absorbed.
    Warning,
    /// A call failed after all retries.
    Error,
    /// A call failed in a way retrying cannot fix, or a dependency is isolated or down.
    Critical,
}

impl Severity {
    /// Upper-case label, as used in alert subjects.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something noteworthy that happened inside a retry executor, circuit breaker or health prober.
///
/// Events are logged, counted when metrics are enabled, and handed to the listener registered
/// with [`ResilienceContext::on_event`][crate::ResilienceContext::on_event].
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ResilienceEvent {
    /// A transient failure will be retried after `delay`.
    RetryScheduled {
        /// The service being called.
        service: ServiceName,
        /// The 1-based number of the attempt that just failed.
        attempt: u32,
        /// How long the executor waits before the next attempt.
        delay: Duration,
        /// Classification of the failure.
        classification: ErrorClassification,
    },

    /// A call failed for good, either on a permanent error or after exhausting its attempts.
    CallTerminallyFailed {
        /// The service being called.
        service: ServiceName,
        /// Classification of the last failure.
        classification: ErrorClassification,
        /// How many times the operation was invoked.
        attempts_used: u32,
        /// `true` when the failure was transient and the attempts ran out.
        retriable: bool,
    },

    /// The circuit breaker rejected a call without invoking the operation.
    CallRejected {
        /// The isolated service.
        service: ServiceName,
        /// Time left until the breaker lets a trial call through.
        remaining: Duration,
    },

    /// The circuit breaker opened.
    CircuitOpened {
        /// The isolated service.
        service: ServiceName,
        /// When the breaker opened.
        timestamp: SystemTime,
        /// `true` when a half-open trial failed, `false` when the failure threshold was reached.
        reopened: bool,
    },

    /// The open timeout elapsed and the circuit breaker lets trial calls through.
    CircuitHalfOpened {
        /// The service under trial.
        service: ServiceName,
    },

    /// Enough half-open trials succeeded and the circuit breaker closed.
    CircuitClosed {
        /// The recovered service.
        service: ServiceName,
    },

    /// The circuit breaker was forced closed.
    CircuitReset {
        /// The service whose breaker was reset.
        service: ServiceName,
        /// The state the breaker was in before the reset.
        previous: CircuitState,
    },

    /// A health probe completed.
    HealthProbed {
        /// The probed service.
        service: ServiceName,
        /// The probe outcome.
        result: HealthProbeResult,
    },

    /// A service failed enough consecutive health probes to be considered down.
    ///
    /// Emitted once per outage. The next healthy probe re-arms it.
    DependencyDown {
        /// The service that is down.
        service: ServiceName,
        /// Number of consecutive unhealthy probes.
        consecutive_failures: u32,
        /// When the threshold was reached.
        timestamp: SystemTime,
    },
}

impl ResilienceEvent {
    /// The service this event is about.
    #[must_use]
    pub fn service(&self) -> &ServiceName {
        match self {
            Self::RetryScheduled { service, .. }
            | Self::CallTerminallyFailed { service, .. }
            | Self::CallRejected { service, .. }
            | Self::CircuitOpened { service, .. }
            | Self::CircuitHalfOpened { service }
            | Self::CircuitClosed { service }
            | Self::CircuitReset { service, .. }
            | Self::HealthProbed { service, .. }
            | Self::DependencyDown { service, .. } => service,
        }
    }

    /// A short `snake_case` name of the event, used as metric dimension.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::CallTerminallyFailed { .. } => "call_terminally_failed",
            Self::CallRejected { .. } => "call_rejected",
            Self::CircuitOpened { .. } => "circuit_opened",
            Self::CircuitHalfOpened { .. } => "circuit_half_opened",
            Self::CircuitClosed { .. } => "circuit_closed",
            Self::CircuitReset { .. } => "circuit_reset",
            Self::HealthProbed { .. } => "health_probed",
            Self::DependencyDown { .. } => "dependency_down",
        }
    }

    /// How urgently the event needs attention.
    ///
    /// Permanent call failures, breaker trips and dependency outages are critical. Calls that
    /// exhausted their retries are errors.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::CallTerminallyFailed { classification, .. } if classification.is_permanent() => Severity::Critical,
            Self::CallTerminallyFailed { .. } => Severity::Error,
            Self::CircuitOpened { .. } | Self::DependencyDown { .. } => Severity::Critical,
            Self::RetryScheduled { .. } | Self::CallRejected { .. } => Severity::Warning,
            Self::HealthProbed { result, .. } if !result.healthy => Severity::Warning,
            Self::HealthProbed { .. } | Self::CircuitHalfOpened { .. } | Self::CircuitClosed { .. } | Self::CircuitReset { .. } => {
                Severity::Info
            }
        }
    }
}

define_fn_wrapper!(
    /// Receives every [`ResilienceEvent`] emitted under a [`ResilienceContext`][crate::ResilienceContext].
    ///
    /// The listener runs synchronously on the task that produced the event and must not block.
    pub EventListener(Fn(event: &ResilienceEvent))
);

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PermanentKind, TransientKind};

    fn service() -> ServiceName {
        ServiceName::from("tts")
    }

    #[test]
    fn permanent_failure_is_critical() {
        let event = ResilienceEvent::CallTerminallyFailed {
            service: service(),
            classification: ErrorClassification::Permanent(PermanentKind::Authentication),
            attempts_used: 1,
            retriable: false,
        };

        assert_eq!(event.severity(), Severity::Critical);
        assert_eq!(event.name(), "call_terminally_failed");
    }

    #[test]
    fn exhausted_failure_is_error() {
        let event = ResilienceEvent::CallTerminallyFailed {
            service: service(),
            classification: ErrorClassification::Transient(TransientKind::ServiceUnavailable),
            attempts_used: 3,
            retriable: true,
        };

        assert_eq!(event.severity(), Severity::Error);
    }

    #[test]
    fn probe_severity_depends_on_outcome() {
        let healthy = ResilienceEvent::HealthProbed {
            service: service(),
            result: HealthProbeResult::new(true, SystemTime::UNIX_EPOCH),
        };
        let unhealthy = ResilienceEvent::HealthProbed {
            service: service(),
            result: HealthProbeResult::new(false, SystemTime::UNIX_EPOCH),
        };

        assert_eq!(healthy.severity(), Severity::Info);
        assert_eq!(unhealthy.severity(), Severity::Warning);
    }

    #[test]
    fn breaker_trip_is_critical() {
        let event = ResilienceEvent::CircuitOpened {
            service: service(),
            timestamp: SystemTime::UNIX_EPOCH,
            reopened: false,
        };

        assert_eq!(event.severity(), Severity::Critical);
        assert_eq!(event.service().as_str(), "tts");
    }

    #[test]
    fn severity_orders_by_urgency() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
    }
}
