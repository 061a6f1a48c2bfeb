// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

use tick::Clock;

use crate::ShutdownToken;
use crate::events::{EventListener, ResilienceEvent};
use crate::telemetry::Telemetry;

pub(crate) const DEFAULT_PIPELINE_NAME: &str = "default";

/// Shared configuration and infrastructure for retry executors, circuit breakers and health probers.
///
/// The context carries the [`Clock`] used for every delay and timestamp, the name of the
/// pipeline used in telemetry, the optional event listener, the optional meter and the
/// [`ShutdownToken`]. Create one context per agent and pass it to every component.
///
/// # Examples
///
/// ```rust
/// use lifeline::ResilienceContext;
/// use tick::Clock;
///
/// # fn example(clock: Clock) {
/// let context = ResilienceContext::new(&clock)
///     .name("call_agent")
///     .on_event(|event| println!("{}: {}", event.severity(), event.name()));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ResilienceContext {
    clock: Clock,
    name: Cow<'static, str>,
    listener: Option<EventListener>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
    shutdown: ShutdownToken,
}

impl ResilienceContext {
    /// Creates a context with the given clock, the default name and a fresh shutdown token.
    pub fn new(clock: impl AsRef<Clock>) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            name: Cow::Borrowed(DEFAULT_PIPELINE_NAME),
            listener: None,
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            shutdown: ShutdownToken::new(),
        }
    }

    /// Sets the name reported in logs and metrics.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers the function that receives every emitted [`ResilienceEvent`].
    ///
    /// This is where alerting hooks in. A later call replaces the earlier listener.
    #[must_use]
    pub fn on_event(mut self, listener: impl Fn(&ResilienceEvent) + Send + Sync + 'static) -> Self {
        self.listener = Some(EventListener::new(listener));
        self
    }

    /// Reports every event to the `resilience.event` counter of the given provider.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    pub fn enable_metrics(self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        Self {
            meter: Some(crate::metrics::create_meter(provider)),
            ..self
        }
    }

    /// Uses an existing shutdown token instead of the one created by [`new`][Self::new].
    #[must_use]
    pub fn shutdown_token(mut self, token: ShutdownToken) -> Self {
        self.shutdown = token;
        self
    }

    /// The clock that drives delays, timers and timestamps.
    #[must_use]
    pub fn get_clock(&self) -> &Clock {
        &self.clock
    }

    /// The pipeline name.
    #[must_use]
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// The token that stops retries and probe loops created from this context.
    #[must_use]
    pub fn get_shutdown(&self) -> &ShutdownToken {
        &self.shutdown
    }

    pub(crate) fn create_telemetry(&self, component: &'static str) -> Telemetry {
        Telemetry {
            pipeline_name: self.name.clone(),
            component,
            listener: self.listener.clone(),
            #[cfg(any(feature = "metrics", test))]
            event_reporter: self.meter.as_ref().map(crate::metrics::create_resilience_event_counter),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(ResilienceContext: Send, Sync, Clone, std::fmt::Debug);

    #[test]
    fn new_sets_default_pipeline_name() {
        let context = ResilienceContext::new(Clock::new_frozen());
        let telemetry = context.create_telemetry("test");

        assert_eq!(telemetry.pipeline_name.as_ref(), DEFAULT_PIPELINE_NAME);
        assert_eq!(context.get_name(), DEFAULT_PIPELINE_NAME);
        assert!(telemetry.listener.is_none());
        assert!(telemetry.event_reporter.is_none());
    }

    #[test]
    fn name_with_owned_value() {
        let context = ResilienceContext::new(Clock::new_frozen()).name(String::from("custom_pipeline"));
        let telemetry = context.create_telemetry("test");

        assert_eq!(telemetry.pipeline_name.as_ref(), "custom_pipeline");
        assert!(matches!(telemetry.pipeline_name, Cow::Owned(_)));
    }

    #[test]
    fn shutdown_token_is_shared() {
        let token = ShutdownToken::new();
        let context = ResilienceContext::new(Clock::new_frozen()).shutdown_token(token.clone());
        let clone = context.clone();

        token.trigger();

        assert!(context.get_shutdown().is_triggered());
        assert!(clone.get_shutdown().is_triggered());
    }

    #[test]
    fn listener_is_propagated_to_telemetry() {
        let context = ResilienceContext::new(Clock::new_frozen()).on_event(|_| {});

        assert!(context.create_telemetry("test").listener.is_some());
    }
}
