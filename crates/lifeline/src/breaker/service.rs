// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use parking_lot::Mutex;
use tick::Clock;

use super::state::{BreakerState, EnterCircuitResult, ExecutionResult, ExitCircuitResult};
use super::{BreakerConfig, BreakerError, BreakerSnapshot, CircuitOpenError, CircuitState};
use crate::events::ResilienceEvent;
use crate::health::HealthProbeResult;
use crate::retry::{RetryExecutor, RetryPolicy, TerminalCause};
use crate::telemetry::{BREAKER_COMPONENT, Telemetry};
use crate::{ClassifiedError, ResilienceContext, ServiceName};

/// Isolates one external service behind a circuit breaker.
///
/// Each breaker owns a [`RetryExecutor`] and counts one failure per call that the executor gives
/// up on, whether the last failure was permanent or the attempts ran out:
///
/// - **Closed**: calls pass through. `failure_threshold` consecutive failed calls open the circuit.
/// - **Open**: calls fail fast with [`CircuitOpenError`]. The first call after `open_timeout`
///   moves the circuit to half-open.
/// - **Half-open**: calls pass through as trials. `success_threshold` consecutive successes
///   close the circuit; a single failure reopens it.
///
/// A [`HealthProber`][crate::health::HealthProber] may [`reset`][Self::reset] an open circuit
/// early through [`record_probe`][Self::record_probe].
///
/// Cloning is cheap; clones share the same state.
///
/// # Examples
///
/// ```rust
/// use lifeline::breaker::{BreakerConfig, CircuitBreaker};
/// use lifeline::retry::RetryPolicy;
/// use lifeline::{ClassifiedError, FaultCondition, ResilienceContext};
/// use tick::Clock;
///
/// # async fn example(clock: Clock) {
/// let context = ResilienceContext::new(&clock).name("call_agent");
/// let tts = CircuitBreaker::new("elevenlabs_tts", BreakerConfig::new(), RetryPolicy::new(), &context);
///
/// let audio = tts
///     .execute(|| async {
///         // invoke the provider here
///         Err::<Vec<u8>, _>(ClassifiedError::from_condition(FaultCondition::HttpStatus(401), "invalid api key"))
///     })
///     .await;
///
/// assert!(audio.is_err());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    shared: Arc<BreakerShared>,
}

#[derive(Debug)]
struct BreakerShared {
    service: ServiceName,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
    retry: RetryExecutor,
    clock: Clock,
    telemetry: Telemetry,
}

impl CircuitBreaker {
    /// Creates a closed circuit breaker for `service`.
    ///
    /// Calls are retried according to `retry_policy` before the breaker sees their outcome.
    pub fn new(service: impl Into<ServiceName>, config: BreakerConfig, retry_policy: RetryPolicy, context: &ResilienceContext) -> Self {
        let service = service.into();

        Self {
            shared: Arc::new(BreakerShared {
                retry: RetryExecutor::new(service.clone(), retry_policy, context),
                service,
                config,
                state: Mutex::new(BreakerState::new()),
                clock: context.get_clock().clone(),
                telemetry: context.create_telemetry(BREAKER_COMPONENT),
            }),
        }
    }

    /// The protected service.
    #[must_use]
    pub fn service(&self) -> &ServiceName {
        &self.shared.service
    }

    /// The thresholds and timing of this breaker.
    #[must_use]
    pub fn config(&self) -> &BreakerConfig {
        &self.shared.config
    }

    /// The backoff schedule applied to each call.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        self.shared.retry.policy()
    }

    /// The stored circuit state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.shared.state.lock().state()
    }

    /// A copy of the breaker's counters and state.
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.shared.state.lock().snapshot()
    }

    /// Runs `operation` through the circuit and the retry executor.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] without invoking the operation when the circuit is open,
    /// and [`BreakerError::Terminal`] when the retry executor gives up.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, BreakerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClassifiedError>>,
    {
        let now = self.shared.clock.instant();
        let entered = self.shared.state.lock().enter(now, &self.shared.config);

        match entered {
            EnterCircuitResult::Rejected { remaining } => {
                self.shared.telemetry.emit(&ResilienceEvent::CallRejected {
                    service: self.shared.service.clone(),
                    remaining,
                });

                return Err(CircuitOpenError::new(self.shared.service.clone(), remaining).into());
            }
            EnterCircuitResult::Accepted { half_opened: true } => {
                self.shared.telemetry.emit(&ResilienceEvent::CircuitHalfOpened {
                    service: self.shared.service.clone(),
                });
            }
            EnterCircuitResult::Accepted { half_opened: false } => {}
        }

        let result = self.shared.retry.run(operation).await;

        let execution = match &result {
            Ok(_) => Some(ExecutionResult::Success),
            Err(error) if error.cause() == TerminalCause::Interrupted => None,
            Err(_) => Some(ExecutionResult::Failure),
        };

        if let Some(execution) = execution {
            self.shared.exit(execution);
        }

        result.map_err(BreakerError::Terminal)
    }

    /// Forces the circuit closed and clears both counters.
    pub fn reset(&self) {
        let previous = self.shared.state.lock().reset();
        self.shared.emit_reset(previous);
    }

    /// Applies the outcome of an out-of-band health probe.
    ///
    /// A healthy probe resets an **open** circuit without waiting for the open timeout.
    /// Closed and half-open circuits are left alone, as is every circuit on an unhealthy probe.
    ///
    /// Returns `true` if the circuit was reset.
    pub fn record_probe(&self, result: &HealthProbeResult) -> bool {
        if !result.healthy {
            return false;
        }

        let previous = {
            let mut state = self.shared.state.lock();
            if state.state() != CircuitState::Open {
                return false;
            }

            state.reset()
        };

        self.shared.emit_reset(previous);
        true
    }
}

impl BreakerShared {
    fn exit(&self, execution: ExecutionResult) {
        let now = self.clock.instant();
        let exited = self.state.lock().exit(execution, now, &self.config);

        match exited {
            ExitCircuitResult::Unchanged => {}
            ExitCircuitResult::Opened | ExitCircuitResult::Reopened => {
                self.telemetry.emit(&ResilienceEvent::CircuitOpened {
                    service: self.service.clone(),
                    timestamp: self.clock.system_time(),
                    reopened: exited == ExitCircuitResult::Reopened,
                });
            }
            ExitCircuitResult::Closed => {
                self.telemetry.emit(&ResilienceEvent::CircuitClosed {
                    service: self.service.clone(),
                });
            }
        }
    }

    fn emit_reset(&self, previous: CircuitState) {
        self.telemetry.emit(&ResilienceEvent::CircuitReset {
            service: self.service.clone(),
            previous,
        });
    }
}
