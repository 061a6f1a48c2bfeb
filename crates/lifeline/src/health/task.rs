// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use tick::{Clock, PeriodicTimer};

use super::HealthProbeResult;
use crate::breaker::CircuitBreaker;
use crate::events::ResilienceEvent;
use crate::fn_wrapper::define_fn_wrapper;
use crate::telemetry::Telemetry;
use crate::{ServiceName, ShutdownToken};

define_fn_wrapper!(pub(crate) ProbeFn(Fn() -> BoxFuture<'static, bool>));

/// The probe loop of a single service.
#[derive(Debug)]
pub(crate) struct ProbeTask {
    service: ServiceName,
    breaker: CircuitBreaker,
    probe: ProbeFn,
    clock: Clock,
    telemetry: Telemetry,
    down_threshold: u32,
    consecutive_failures: u32,
    down_reported: bool,
}

impl ProbeTask {
    pub(crate) fn new(breaker: CircuitBreaker, probe: ProbeFn, clock: Clock, telemetry: Telemetry, down_threshold: u32) -> Self {
        Self {
            service: breaker.service().clone(),
            breaker,
            probe,
            clock,
            telemetry,
            down_threshold,
            consecutive_failures: 0,
            down_reported: false,
        }
    }

    /// Probes every `interval` until `stop` or `shutdown` is triggered.
    ///
    /// A probe that is already running when the loop is stopped completes first.
    pub(crate) async fn run(mut self, interval: Duration, stop: ShutdownToken, shutdown: ShutdownToken) {
        let mut timer = PeriodicTimer::new(&self.clock, interval);

        tracing::event!(
            name: "lifeline.health.started",
            tracing::Level::DEBUG,
            pipeline.name = %self.telemetry.pipeline_name,
            service.name = %self.service,
            health.interval = interval.as_secs_f32(),
            "health probe loop started"
        );

        loop {
            tokio::select! {
                biased;
                () = stop.triggered() => break,
                () = shutdown.triggered() => break,
                tick = timer.next() => {
                    if tick.is_none() {
                        break;
                    }
                }
            }

            self.check_once().await;
        }

        tracing::event!(
            name: "lifeline.health.stopped",
            tracing::Level::DEBUG,
            pipeline.name = %self.telemetry.pipeline_name,
            service.name = %self.service,
            "health probe loop stopped"
        );
    }

    /// Runs one probe and applies its outcome.
    pub(crate) async fn check_once(&mut self) -> HealthProbeResult {
        let healthy = self.probe.call().await;
        let result = HealthProbeResult::new(healthy, self.clock.system_time());

        self.telemetry.emit(&ResilienceEvent::HealthProbed {
            service: self.service.clone(),
            result,
        });

        if healthy {
            self.consecutive_failures = 0;
            self.down_reported = false;
            self.breaker.record_probe(&result);
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);

            if self.consecutive_failures >= self.down_threshold && !self.down_reported {
                self.down_reported = true;
                self.telemetry.emit(&ResilienceEvent::DependencyDown {
                    service: self.service.clone(),
                    consecutive_failures: self.consecutive_failures,
                    timestamp: result.checked_at,
                });
            }
        }

        result
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use futures_util::FutureExt;
    use tick::ClockControl;

    use super::*;
    use crate::breaker::{BreakerConfig, CircuitState};
    use crate::retry::RetryPolicy;
    use crate::telemetry::HEALTH_COMPONENT;
    use crate::testing::transient;
    use crate::ResilienceContext;

    struct Fixture {
        task: ProbeTask,
        breaker: CircuitBreaker,
        healthy: Arc<AtomicBool>,
        events: Arc<Mutex<Vec<ResilienceEvent>>>,
    }

    fn fixture(down_threshold: u32) -> Fixture {
        let clock = ClockControl::new().to_clock();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        let context = ResilienceContext::new(&clock).on_event(move |event| events_clone.lock().unwrap().push(event.clone()));
        let breaker = CircuitBreaker::new("tts", BreakerConfig::new(), RetryPolicy::new().max_attempts(1), &context);
        let healthy = Arc::new(AtomicBool::new(true));
        let healthy_clone = Arc::clone(&healthy);
        let probe = ProbeFn::new(move || {
            let healthy = healthy_clone.load(Ordering::Relaxed);
            async move { healthy }.boxed()
        });

        Fixture {
            task: ProbeTask::new(
                breaker.clone(),
                probe,
                clock,
                context.create_telemetry(HEALTH_COMPONENT),
                down_threshold,
            ),
            breaker,
            healthy,
            events,
        }
    }

    async fn open(breaker: &CircuitBreaker) {
        for _ in 0..3 {
            let _ = breaker.execute(|| async { Err::<(), _>(transient()) }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    fn count(events: &Mutex<Vec<ResilienceEvent>>, name: &str) -> usize {
        events.lock().unwrap().iter().filter(|e| e.name() == name).count()
    }

    #[tokio::test]
    async fn healthy_probe_resets_open_breaker() {
        let mut fixture = fixture(3);
        open(&fixture.breaker).await;

        let result = fixture.task.check_once().await;

        assert!(result.healthy);
        assert_eq!(fixture.breaker.state(), CircuitState::Closed);
        assert_eq!(count(&fixture.events, "health_probed"), 1);
        assert_eq!(count(&fixture.events, "circuit_reset"), 1);
    }

    #[tokio::test]
    async fn unhealthy_probe_leaves_breaker_open() {
        let mut fixture = fixture(3);
        open(&fixture.breaker).await;
        fixture.healthy.store(false, Ordering::Relaxed);

        let result = fixture.task.check_once().await;

        assert!(!result.healthy);
        assert_eq!(fixture.breaker.state(), CircuitState::Open);
        assert_eq!(count(&fixture.events, "circuit_reset"), 0);
    }

    #[tokio::test]
    async fn healthy_probe_leaves_closed_breaker_untouched() {
        let mut fixture = fixture(3);

        fixture.task.check_once().await;

        assert_eq!(count(&fixture.events, "circuit_reset"), 0);
    }

    #[tokio::test]
    async fn dependency_down_reported_once_per_outage() {
        let mut fixture = fixture(3);
        fixture.healthy.store(false, Ordering::Relaxed);

        for _ in 0..5 {
            fixture.task.check_once().await;
        }
        assert_eq!(count(&fixture.events, "dependency_down"), 1);

        fixture.healthy.store(true, Ordering::Relaxed);
        fixture.task.check_once().await;
        fixture.healthy.store(false, Ordering::Relaxed);
        for _ in 0..3 {
            fixture.task.check_once().await;
        }
        assert_eq!(count(&fixture.events, "dependency_down"), 2);
    }

    #[tokio::test]
    async fn dependency_down_carries_failure_count() {
        let mut fixture = fixture(2);
        fixture.healthy.store(false, Ordering::Relaxed);

        fixture.task.check_once().await;
        fixture.task.check_once().await;

        let events = fixture.events.lock().unwrap();
        let down = events.iter().find(|e| e.name() == "dependency_down").unwrap();
        assert!(matches!(
            down,
            ResilienceEvent::DependencyDown {
                consecutive_failures: 2,
                ..
            }
        ));
    }
}
