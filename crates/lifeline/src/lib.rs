// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Error classification, retries and per-service circuit breakers for agents that call
//! unreliable services.
//!
//! An agent that places calls through a chain of external providers (a language model,
//! a text-to-speech engine, a telephony gateway) has to keep working while some of those
//! providers misbehave. This crate gives every provider its own isolation boundary:
//!
//! - [`classify`] decides whether a failure is worth retrying ([`ErrorClassification::Transient`])
//!   or not ([`ErrorClassification::Permanent`]).
//! - [`retry::RetryExecutor`] retries transient failures with exponential backoff.
//! - [`breaker::CircuitBreaker`] stops calling a service that keeps failing and lets a few
//!   trial calls through once its open timeout has passed.
//! - [`health::HealthProber`] probes services in the background and closes their circuit as
//!   soon as they recover.
//!
//! Every state change is reported as a [`ResilienceEvent`]. Events are logged through
//! [`tracing`], counted through OpenTelemetry when metrics are enabled, and handed to the
//! listener registered with [`ResilienceContext::on_event`], which is where alerting hooks in.
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use lifeline::breaker::{BreakerConfig, CircuitBreaker};
//! use lifeline::health::HealthProber;
//! use lifeline::retry::RetryPolicy;
//! use lifeline::{ClassifiedError, FaultCondition, ResilienceContext, Severity};
//! use tick::Clock;
//!
//! # async fn example(clock: Clock) -> Result<(), Box<dyn std::error::Error>> {
//! let context = ResilienceContext::new(&clock)
//!     .name("call_agent")
//!     .on_event(|event| {
//!         if event.severity() >= Severity::Error {
//!             eprintln!("alert: {} on {}", event.name(), event.service());
//!         }
//!     });
//!
//! let tts = CircuitBreaker::new(
//!     "elevenlabs_tts",
//!     BreakerConfig::new().failure_threshold(3).open_timeout(Duration::from_secs(30)),
//!     RetryPolicy::new().initial_delay(Duration::from_secs(5)).max_attempts(3),
//!     &context,
//! );
//!
//! let prober = HealthProber::new(&context);
//! prober.start(&tts, Duration::from_secs(10), || async { true })?;
//!
//! let audio = tts
//!     .execute(|| async {
//!         // synthesize speech here
//!         Err::<Vec<u8>, _>(ClassifiedError::from_condition(FaultCondition::HttpStatus(503), "service unavailable"))
//!     })
//!     .await;
//!
//! if let Err(error) = audio {
//!     // skip this contact and move on
//!     eprintln!("{error}");
//! }
//!
//! prober.stop_all().await;
//! # Ok(())
//! # }
//! ```
//!
//! > **Note**: every delay, timer and timestamp goes through the [`Clock`][tick::Clock] of the
//! > [`ResilienceContext`], so tests can drive time with `tick::ClockControl`.
//!
//! # Recovery Metadata
//!
//! [`ClassifiedError`] and the errors returned by the circuit breaker implement [`Recovery`],
//! so callers that already speak [`RecoveryInfo`] can treat them like any other error.
//!
//! ## Features
//!
//! - `serde`: Enables the [`config`] module, which deserializes retry, breaker and health
//!   settings from configuration files.
//! - `metrics`: Enables [`ResilienceContext::enable_metrics`], which counts every event in the
//!   `resilience.event` OpenTelemetry counter.

#[doc(inline)]
pub use recoverable::{Recovery, RecoveryInfo, RecoveryKind};

mod classify;
mod context;
mod events;
mod fn_wrapper;
mod service_name;
mod shutdown;
mod telemetry;

pub mod breaker;
pub mod health;
pub mod retry;

#[cfg(any(feature = "serde", test))]
pub mod config;

#[cfg(any(feature = "metrics", test))]
mod metrics;

pub use classify::{ClassifiedError, ErrorClassification, FaultCondition, PermanentKind, TransientKind, classify};
pub use context::ResilienceContext;
pub use events::{EventListener, ResilienceEvent, Severity};
pub use service_name::ServiceName;
pub use shutdown::ShutdownToken;

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
pub(crate) mod testing;
