// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tick::Clock;
use tokio::task::JoinHandle;

use super::constants::DEFAULT_DEPENDENCY_DOWN_THRESHOLD;
use super::task::{ProbeFn, ProbeTask};
use super::ProberError;
use crate::breaker::CircuitBreaker;
use crate::telemetry::{HEALTH_COMPONENT, Telemetry};
use crate::{ResilienceContext, ServiceName, ShutdownToken};

/// Probes external services in the background and resets their circuit breakers once they recover.
///
/// Every started service gets its own loop, running as a Tokio task. Each `interval` the loop
/// invokes the probe function and reports a [`HealthProbed`][crate::ResilienceEvent::HealthProbed]
/// event. A healthy probe while the service's breaker is open resets the breaker right away,
/// without waiting for the open timeout.
///
/// After `dependency_down_threshold` consecutive unhealthy probes the prober reports
/// [`DependencyDown`][crate::ResilienceEvent::DependencyDown] once; a healthy probe re-arms it.
///
/// Loops end on [`stop`][Self::stop], [`stop_all`][Self::stop_all], when the context's
/// [`ShutdownToken`] is triggered, or when the prober is dropped.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use lifeline::ResilienceContext;
/// use lifeline::breaker::{BreakerConfig, CircuitBreaker};
/// use lifeline::health::HealthProber;
/// use lifeline::retry::RetryPolicy;
/// use tick::Clock;
///
/// # async fn example(clock: Clock) -> Result<(), lifeline::health::ProberError> {
/// let context = ResilienceContext::new(&clock);
/// let tts = CircuitBreaker::new("elevenlabs_tts", BreakerConfig::new(), RetryPolicy::new(), &context);
///
/// let prober = HealthProber::new(&context);
/// prober.start(&tts, Duration::from_secs(10), || async {
///     // ping the provider's status endpoint here
///     true
/// })?;
///
/// prober.stop(tts.service()).await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HealthProber {
    clock: Clock,
    shutdown: ShutdownToken,
    telemetry: Telemetry,
    down_threshold: u32,
    loops: Mutex<HashMap<ServiceName, ProbeLoop>>,
}

#[derive(Debug)]
struct ProbeLoop {
    stop: ShutdownToken,
    handle: JoinHandle<()>,
}

impl HealthProber {
    /// Creates a prober that shares the clock, telemetry and shutdown token of `context`.
    #[must_use]
    pub fn new(context: &ResilienceContext) -> Self {
        Self {
            clock: context.get_clock().clone(),
            shutdown: context.get_shutdown().clone(),
            telemetry: context.create_telemetry(HEALTH_COMPONENT),
            down_threshold: DEFAULT_DEPENDENCY_DOWN_THRESHOLD,
            loops: Mutex::new(HashMap::new()),
        }
    }

    /// Sets how many consecutive unhealthy probes report a service as down. Defaults to 3.
    ///
    /// Values below 1 become 1. Applies to loops started afterwards.
    #[must_use]
    pub fn dependency_down_threshold(mut self, threshold: u32) -> Self {
        self.down_threshold = threshold.max(1);
        self
    }

    /// Starts probing the service protected by `breaker` every `interval`.
    ///
    /// The first probe runs one `interval` after the call.
    ///
    /// # Errors
    ///
    /// Returns [`ProberError::AlreadyRunning`] if a loop for the same service is active, and
    /// [`ProberError::NoRuntime`] when called outside of a Tokio runtime.
    pub fn start<F, Fut>(&self, breaker: &CircuitBreaker, interval: Duration, probe: F) -> Result<(), ProberError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let service = breaker.service().clone();
        let mut loops = self.loops.lock();

        if loops.get(&service).is_some_and(|l| !l.handle.is_finished()) {
            return Err(ProberError::AlreadyRunning(service));
        }

        let runtime = tokio::runtime::Handle::try_current()?;

        let task = ProbeTask::new(
            breaker.clone(),
            ProbeFn::new(move || probe().boxed()),
            self.clock.clone(),
            self.telemetry.clone(),
            self.down_threshold,
        );

        let stop = ShutdownToken::new();
        let handle = runtime.spawn(task.run(interval, stop.clone(), self.shutdown.clone()));

        loops.insert(service, ProbeLoop { stop, handle });

        Ok(())
    }

    /// Stops the loop of `service` and waits for it to end.
    ///
    /// A probe that is in flight completes, but no further probe is started.
    /// Returns `false` if no loop was registered for the service.
    pub async fn stop(&self, service: &ServiceName) -> bool {
        let removed = self.loops.lock().remove(service);

        match removed {
            Some(probe_loop) => {
                probe_loop.join(service).await;
                true
            }
            None => false,
        }
    }

    /// Stops every loop and waits for all of them to end.
    pub async fn stop_all(&self) {
        let drained: Vec<_> = self.loops.lock().drain().collect();

        for (_, probe_loop) in &drained {
            probe_loop.stop.trigger();
        }

        for (service, probe_loop) in drained {
            probe_loop.join(&service).await;
        }
    }

    /// Returns `true` while a loop is running for `service`.
    #[must_use]
    pub fn is_running(&self, service: &ServiceName) -> bool {
        self.loops.lock().get(service).is_some_and(|l| !l.handle.is_finished())
    }
}

impl ProbeLoop {
    async fn join(self, service: &ServiceName) {
        self.stop.trigger();

        if let Err(error) = self.handle.await {
            tracing::event!(
                name: "lifeline.health.join_failed",
                tracing::Level::ERROR,
                service.name = %service,
                error = %error,
                "health probe loop ended abnormally"
            );
        }
    }
}

impl Drop for HealthProber {
    fn drop(&mut self) {
        for probe_loop in self.loops.get_mut().values() {
            probe_loop.stop.trigger();
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tick::ClockControl;

    use super::*;
    use crate::breaker::BreakerConfig;
    use crate::retry::RetryPolicy;

    static_assertions::assert_impl_all!(HealthProber: Send, Sync, std::fmt::Debug);

    fn breaker(context: &ResilienceContext) -> CircuitBreaker {
        CircuitBreaker::new("tts", BreakerConfig::new(), RetryPolicy::new(), context)
    }

    #[test]
    fn start_outside_runtime_fails() {
        let context = ResilienceContext::new(Clock::new_frozen());
        let prober = HealthProber::new(&context);

        let error = prober
            .start(&breaker(&context), Duration::from_secs(1), || async { true })
            .unwrap_err();

        assert!(matches!(error, ProberError::NoRuntime(_)));
    }

    #[tokio::test]
    async fn start_twice_fails() {
        let context = ResilienceContext::new(ClockControl::new().to_clock());
        let prober = HealthProber::new(&context);
        let breaker = breaker(&context);

        prober.start(&breaker, Duration::from_secs(1), || async { true }).unwrap();
        let error = prober.start(&breaker, Duration::from_secs(1), || async { true }).unwrap_err();

        assert!(matches!(error, ProberError::AlreadyRunning(ref s) if s.as_str() == "tts"));
        assert!(prober.is_running(breaker.service()));
    }

    #[tokio::test]
    async fn stop_unknown_service_returns_false() {
        let context = ResilienceContext::new(ClockControl::new().to_clock());
        let prober = HealthProber::new(&context);

        assert!(!prober.stop(&ServiceName::from("nobody")).await);
    }

    #[tokio::test]
    async fn stop_ends_loop_and_allows_restart() {
        let context = ResilienceContext::new(ClockControl::new().to_clock());
        let prober = HealthProber::new(&context);
        let breaker = breaker(&context);

        prober.start(&breaker, Duration::from_secs(1), || async { true }).unwrap();
        assert!(prober.stop(breaker.service()).await);
        assert!(!prober.is_running(breaker.service()));

        prober.start(&breaker, Duration::from_secs(1), || async { true }).unwrap();
        prober.stop_all().await;
        assert!(!prober.is_running(breaker.service()));
    }

    #[tokio::test]
    async fn shutdown_ends_loop() {
        let context = ResilienceContext::new(ClockControl::new().to_clock());
        let prober = HealthProber::new(&context);
        let breaker = breaker(&context);
        let probes = Arc::new(AtomicU32::new(0));
        let probes_clone = Arc::clone(&probes);

        prober
            .start(&breaker, Duration::from_secs(1), move || {
                probes_clone.fetch_add(1, Ordering::Relaxed);
                async { true }
            })
            .unwrap();

        context.get_shutdown().trigger();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(!prober.is_running(breaker.service()));
        assert_eq!(probes.load(Ordering::Relaxed), 0);
    }
}
