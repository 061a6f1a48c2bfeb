// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A call agent that works through a contact list while its speech provider has an outage.
//!
//! 1. The language model writes a script for each contact.
//! 2. The speech provider fails with HTTP 503 for a while. Retries give up and the
//!    speech circuit opens, so the following contacts are skipped without calling it.
//! 3. A health prober notices that the provider is back and closes the circuit early.
//! 4. Errors and critical events are routed to an alert sink by severity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use lifeline::breaker::{BreakerConfig, CircuitBreaker};
use lifeline::health::HealthProber;
use lifeline::retry::RetryPolicy;
use lifeline::{ClassifiedError, FaultCondition, PermanentKind, ResilienceContext, ResilienceEvent, Severity};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_stdout::MetricExporter;
use tick::Clock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const CONTACTS: [&str; 6] = ["Alice", "Bob", "", "Dave", "Erin", "Frank"];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let meter_provider = configure_telemetry();

    let clock = Clock::new_tokio();
    let context = ResilienceContext::new(&clock)
        .name("call_agent")
        .enable_metrics(&meter_provider)
        .on_event(route_alert);

    let llm = CircuitBreaker::new("openai_llm", BreakerConfig::new(), RetryPolicy::new(), &context);
    let tts = CircuitBreaker::new(
        "elevenlabs_tts",
        // Lower the threshold to see the circuit open after a single exhausted call
        BreakerConfig::new().failure_threshold(1).open_timeout(Duration::from_secs(30)),
        RetryPolicy::new().initial_delay(Duration::from_millis(200)).max_attempts(3),
        &context,
    );

    // The speech provider is down for its first three requests
    let speech = Arc::new(SpeechProvider::new(&clock, 3));

    let prober = HealthProber::new(&context);
    let probed = Arc::clone(&speech);
    prober.start(&tts, Duration::from_millis(500), move || {
        let healthy = probed.is_up();
        async move { healthy }
    })?;

    for contact in CONTACTS {
        clock.delay(Duration::from_millis(400)).await;

        let script = match llm.execute(|| generate_script(&clock, contact)).await {
            Ok(script) => script,
            Err(e) => {
                println!("skipping contact '{contact}': {e}");
                continue;
            }
        };

        match tts.execute(|| speech.synthesize(&script)).await {
            Ok(audio) => println!("calling {contact} with {} bytes of audio", audio.len()),
            Err(e) => println!("skipping contact '{contact}': {e}"),
        }
    }

    prober.stop_all().await;

    // Flush metrics to stdout before exiting
    meter_provider.force_flush()?;

    Ok(())
}

fn route_alert(event: &ResilienceEvent) {
    match event.severity() {
        Severity::Critical => println!("[PAGE] {} on '{}'", event.name(), event.service()),
        Severity::Error => println!("[ALERT] {} on '{}'", event.name(), event.service()),
        Severity::Warning | Severity::Info => {}
    }
}

async fn generate_script(clock: &Clock, contact: &str) -> Result<String, ClassifiedError> {
    clock.delay(Duration::from_millis(50)).await;

    if contact.is_empty() {
        return Err(ClassifiedError::permanent(PermanentKind::InvalidPayload, "contact has no name"));
    }

    Ok(format!("Hello {contact}, this is a reminder about your appointment tomorrow."))
}

/// Simulates a speech provider that is unavailable for its first few requests.
#[derive(Debug)]
struct SpeechProvider {
    clock: Clock,
    outage_remaining: AtomicU32,
}

impl SpeechProvider {
    fn new(clock: &Clock, failing_requests: u32) -> Self {
        Self {
            clock: clock.clone(),
            outage_remaining: AtomicU32::new(failing_requests),
        }
    }

    fn is_up(&self) -> bool {
        self.outage_remaining.load(Ordering::Relaxed) == 0
    }

    async fn synthesize(&self, script: &str) -> Result<Vec<u8>, ClassifiedError> {
        self.clock.delay(Duration::from_millis(100)).await;

        let outage = self
            .outage_remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();

        if outage {
            return Err(ClassifiedError::from_condition(FaultCondition::HttpStatus(503), "speech service unavailable"));
        }

        Ok(script.as_bytes().to_vec())
    }
}

fn configure_telemetry() -> SdkMeterProvider {
    // Set up tracing subscriber for logs to console
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    SdkMeterProvider::builder()
        .with_periodic_exporter(MetricExporter::default())
        .build()
}
