// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

use tracing::Level;

use crate::events::{EventListener, ResilienceEvent};

pub(crate) const RETRY_COMPONENT: &str = "retry";
pub(crate) const BREAKER_COMPONENT: &str = "circuit_breaker";
pub(crate) const HEALTH_COMPONENT: &str = "health";

/// Fans a [`ResilienceEvent`] out to the log, the event counter and the registered listener.
#[derive(Debug, Clone)]
pub(crate) struct Telemetry {
    pub(crate) pipeline_name: Cow<'static, str>,
    pub(crate) component: &'static str,
    pub(crate) listener: Option<EventListener>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
}

impl Telemetry {
    pub(crate) fn emit(&self, event: &ResilienceEvent) {
        self.log(event);

        #[cfg(any(feature = "metrics", test))]
        if let Some(reporter) = &self.event_reporter {
            use crate::metrics::{COMPONENT_NAME, EVENT_NAME, PIPELINE_NAME, SERVICE_NAME};

            reporter.add(
                1,
                &[
                    opentelemetry::KeyValue::new(PIPELINE_NAME, self.pipeline_name.clone()),
                    opentelemetry::KeyValue::new(SERVICE_NAME, Cow::from(event.service().clone())),
                    opentelemetry::KeyValue::new(COMPONENT_NAME, self.component),
                    opentelemetry::KeyValue::new(EVENT_NAME, event.name()),
                ],
            );
        }

        if let Some(listener) = &self.listener {
            listener.call(event);
        }
    }

    #[expect(clippy::too_many_lines, reason = "one log statement per event kind")]
    fn log(&self, event: &ResilienceEvent) {
        match event {
            ResilienceEvent::RetryScheduled {
                service,
                attempt,
                delay,
                classification,
            } => {
                tracing::event!(
                    name: "lifeline.retry.scheduled",
                    Level::WARN,
                    pipeline.name = %self.pipeline_name,
                    service.name = %service,
                    resilience.attempt.index = attempt,
                    resilience.retry.delay = delay.as_secs_f32(),
                    error.classification = %classification,
                    "transient failure, retrying"
                );
            }
            ResilienceEvent::CallTerminallyFailed {
                service,
                classification,
                attempts_used,
                retriable,
            } => {
                tracing::event!(
                    name: "lifeline.retry.terminal",
                    Level::ERROR,
                    pipeline.name = %self.pipeline_name,
                    service.name = %service,
                    resilience.attempts_used = attempts_used,
                    resilience.retriable = retriable,
                    error.classification = %classification,
                    "call failed"
                );
            }
            ResilienceEvent::CallRejected { service, remaining } => {
                tracing::event!(
                    name: "lifeline.circuit_breaker.rejected",
                    Level::WARN,
                    pipeline.name = %self.pipeline_name,
                    service.name = %service,
                    circuit_breaker.remaining = remaining.as_secs_f32(),
                    "circuit open, call rejected"
                );
            }
            ResilienceEvent::CircuitOpened { service, reopened, .. } => {
                tracing::event!(
                    name: "lifeline.circuit_breaker.opened",
                    Level::ERROR,
                    pipeline.name = %self.pipeline_name,
                    service.name = %service,
                    circuit_breaker.state = "open",
                    circuit_breaker.reopened = reopened,
                    "circuit opened"
                );
            }
            ResilienceEvent::CircuitHalfOpened { service } => {
                tracing::event!(
                    name: "lifeline.circuit_breaker.half_opened",
                    Level::INFO,
                    pipeline.name = %self.pipeline_name,
                    service.name = %service,
                    circuit_breaker.state = "half_open",
                    "circuit half-open, probing with trial calls"
                );
            }
            ResilienceEvent::CircuitClosed { service } => {
                tracing::event!(
                    name: "lifeline.circuit_breaker.closed",
                    Level::INFO,
                    pipeline.name = %self.pipeline_name,
                    service.name = %service,
                    circuit_breaker.state = "closed",
                    "circuit closed"
                );
            }
            ResilienceEvent::CircuitReset { service, previous } => {
                tracing::event!(
                    name: "lifeline.circuit_breaker.reset",
                    Level::INFO,
                    pipeline.name = %self.pipeline_name,
                    service.name = %service,
                    circuit_breaker.state = "closed",
                    circuit_breaker.previous_state = %previous,
                    "circuit reset"
                );
            }
            ResilienceEvent::HealthProbed { service, result } => {
                if result.healthy {
                    tracing::event!(
                        name: "lifeline.health.probed",
                        Level::DEBUG,
                        pipeline.name = %self.pipeline_name,
                        service.name = %service,
                        health.healthy = true,
                        "health probe succeeded"
                    );
                } else {
                    tracing::event!(
                        name: "lifeline.health.probed",
                        Level::WARN,
                        pipeline.name = %self.pipeline_name,
                        service.name = %service,
                        health.healthy = false,
                        "health probe failed"
                    );
                }
            }
            ResilienceEvent::DependencyDown {
                service,
                consecutive_failures,
                ..
            } => {
                tracing::event!(
                    name: "lifeline.health.dependency_down",
                    Level::ERROR,
                    pipeline.name = %self.pipeline_name,
                    service.name = %service,
                    health.consecutive_failures = consecutive_failures,
                    "dependency is down"
                );
            }
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};
    use tick::Clock;
    use tracing_subscriber::util::SubscriberInitExt;

    use super::*;
    use crate::testing::LogCapture;
    use crate::{ErrorClassification, ResilienceContext, ServiceName, TransientKind};

    fn retry_event() -> ResilienceEvent {
        ResilienceEvent::RetryScheduled {
            service: ServiceName::from("tts"),
            attempt: 1,
            delay: Duration::from_secs(5),
            classification: ErrorClassification::Transient(TransientKind::ServiceUnavailable),
        }
    }

    #[test]
    fn emit_calls_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let context = ResilienceContext::new(Clock::new_frozen()).on_event(move |event| {
            seen_clone.lock().unwrap().push(event.name());
        });

        context.create_telemetry(RETRY_COMPONENT).emit(&retry_event());

        assert_eq!(*seen.lock().unwrap(), vec!["retry_scheduled"]);
    }

    #[test]
    fn emit_logs_structured_fields() {
        let log_capture = LogCapture::new();
        let _guard = log_capture.subscriber().set_default();

        let context = ResilienceContext::new(Clock::new_frozen()).name("log_test_pipeline");
        context.create_telemetry(RETRY_COMPONENT).emit(&retry_event());

        log_capture.assert_contains("transient failure, retrying");
        log_capture.assert_contains("log_test_pipeline");
        log_capture.assert_contains("service.name=tts");
        log_capture.assert_contains("resilience.retry.delay=5");
        log_capture.assert_contains("transient.service_unavailable");
    }

    #[test]
    fn emit_reports_metrics() {
        let exporter = InMemoryMetricExporter::default();
        let provider = SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build();
        let context = ResilienceContext::new(Clock::new_frozen())
            .name("metrics_pipeline")
            .enable_metrics(&provider);

        context.create_telemetry(RETRY_COMPONENT).emit(&retry_event());
        provider.force_flush().unwrap();

        let metrics = format!("{:?}", exporter.get_finished_metrics().unwrap());
        assert!(metrics.contains("resilience.event"));
        assert!(metrics.contains("metrics_pipeline"));
        assert!(metrics.contains("retry_scheduled"));
        assert!(metrics.contains("tts"));
    }
}
