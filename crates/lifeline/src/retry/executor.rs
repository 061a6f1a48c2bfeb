// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;

use super::{RetryPolicy, TerminalCause, TerminalError};
use crate::events::ResilienceEvent;
use crate::telemetry::{RETRY_COMPONENT, Telemetry};
use crate::{ClassifiedError, ErrorClassification, ResilienceContext, ServiceName, ShutdownToken};

/// Runs a service operation and retries transient failures with exponential backoff.
///
/// The executor consults the [`ErrorClassification`] carried by each failure:
///
/// - a **permanent** failure ends the run immediately, without any delay;
/// - a **transient** failure is retried after the next delay of the [`RetryPolicy`] until
///   `max_attempts` invocations have been made.
///
/// Every scheduled retry emits [`ResilienceEvent::RetryScheduled`] and a run that gives up emits
/// [`ResilienceEvent::CallTerminallyFailed`]. Waiting between attempts is interrupted by the
/// context's [`ShutdownToken`], in which case no further attempt is started.
///
/// Cloning is cheap; clones share configuration.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use lifeline::retry::{RetryExecutor, RetryPolicy};
/// use lifeline::{ClassifiedError, ResilienceContext};
/// use tick::Clock;
///
/// # async fn example(clock: Clock) -> Result<(), lifeline::retry::TerminalError> {
/// let context = ResilienceContext::new(&clock);
/// let executor = RetryExecutor::new("llm", RetryPolicy::new().initial_delay(Duration::from_millis(200)), &context);
///
/// let reply = executor
///     .run(|| async { Ok::<_, ClassifiedError>("hello".to_string()) })
///     .await?;
/// assert_eq!(reply, "hello");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    shared: Arc<RetryShared>,
}

#[derive(Debug)]
struct RetryShared {
    service: ServiceName,
    policy: RetryPolicy,
    clock: Clock,
    shutdown: ShutdownToken,
    telemetry: Telemetry,
}

impl RetryExecutor {
    /// Creates an executor for the given service.
    pub fn new(service: impl Into<ServiceName>, policy: RetryPolicy, context: &ResilienceContext) -> Self {
        Self {
            shared: Arc::new(RetryShared {
                service: service.into(),
                policy,
                clock: context.get_clock().clone(),
                shutdown: context.get_shutdown().clone(),
                telemetry: context.create_telemetry(RETRY_COMPONENT),
            }),
        }
    }

    /// The service this executor calls.
    #[must_use]
    pub fn service(&self) -> &ServiceName {
        &self.shared.service
    }

    /// The backoff schedule.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.shared.policy
    }

    /// Invokes `operation` until it succeeds, fails permanently or runs out of attempts.
    ///
    /// The first attempt starts immediately.
    ///
    /// # Errors
    ///
    /// Returns a [`TerminalError`] describing the last failure when the operation does not succeed.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, TerminalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClassifiedError>>,
    {
        let mut attempt = 1;
        let mut delays = self.shared.policy.delays();

        loop {
            let error = match operation().await {
                Ok(value) => {
                    self.shared.report_success(attempt);
                    return Ok(value);
                }
                Err(error) => error,
            };

            match self.shared.evaluate_attempt(error, attempt, &mut delays) {
                ControlFlow::Continue(ContinueRetry { error, delay }) => {
                    if !self.shared.wait(delay).await {
                        return Err(self.shared.interrupted(error, attempt));
                    }

                    attempt += 1;
                }
                ControlFlow::Break(terminal) => return Err(terminal),
            }
        }
    }
}

/// State carried from a failed attempt to the next one.
struct ContinueRetry {
    error: ClassifiedError,
    delay: Duration,
}

impl RetryShared {
    fn evaluate_attempt(
        &self,
        error: ClassifiedError,
        attempt: u32,
        delays: &mut impl Iterator<Item = Duration>,
    ) -> ControlFlow<TerminalError, ContinueRetry> {
        let classification = error.classification();

        let cause = match classification {
            ErrorClassification::Permanent(_) => TerminalCause::Permanent,
            ErrorClassification::Transient(_) => match delays.next() {
                Some(delay) => {
                    self.telemetry.emit(&ResilienceEvent::RetryScheduled {
                        service: self.service.clone(),
                        attempt,
                        delay,
                        classification,
                    });

                    return ControlFlow::Continue(ContinueRetry { error, delay });
                }
                None => TerminalCause::Exhausted,
            },
        };

        let terminal = TerminalError::new(self.service.clone(), attempt, cause, error);

        self.telemetry.emit(&ResilienceEvent::CallTerminallyFailed {
            service: self.service.clone(),
            classification,
            attempts_used: attempt,
            retriable: terminal.retriable(),
        });

        ControlFlow::Break(terminal)
    }

    /// Returns `false` when shutdown was signaled before the delay elapsed.
    async fn wait(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.shutdown.triggered() => false,
            () = self.clock.delay(delay) => true,
        }
    }

    fn interrupted(&self, error: ClassifiedError, attempt: u32) -> TerminalError {
        tracing::event!(
            name: "lifeline.retry.interrupted",
            tracing::Level::INFO,
            pipeline.name = %self.telemetry.pipeline_name,
            service.name = %self.service,
            resilience.attempts_used = attempt,
            "shutdown requested, abandoning retries"
        );

        TerminalError::new(self.service.clone(), attempt, TerminalCause::Interrupted, error)
    }

    fn report_success(&self, attempt: u32) {
        if attempt > 1 {
            tracing::event!(
                name: "lifeline.retry.recovered",
                tracing::Level::INFO,
                pipeline.name = %self.telemetry.pipeline_name,
                service.name = %self.service,
                resilience.attempt.index = attempt,
                "call succeeded after retrying"
            );
        }
    }
}
