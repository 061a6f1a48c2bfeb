// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the retry executor using only public API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lifeline::retry::{RetryExecutor, RetryPolicy, TerminalCause};
use lifeline::{
    ClassifiedError, ErrorClassification, FaultCondition, PermanentKind, ResilienceContext, ResilienceEvent, ShutdownToken,
    TransientKind,
};
use tick::{Clock, ClockControl};

type Events = Arc<Mutex<Vec<ResilienceEvent>>>;

fn context(clock: &Clock) -> (ResilienceContext, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    let context = ResilienceContext::new(clock)
        .name("retry_tests")
        .on_event(move |event| events_clone.lock().unwrap().push(event.clone()));

    (context, events)
}

fn scheduled_delays(events: &Events) -> Vec<Duration> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            ResilienceEvent::RetryScheduled { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect()
}

fn service_unavailable() -> ClassifiedError {
    ClassifiedError::from_condition(FaultCondition::HttpStatus(503), "service unavailable")
}

#[tokio::test]
async fn transient_failures_use_every_attempt() {
    let clock = ClockControl::new().auto_advance_timers(true).to_clock();
    let (context, events) = context(&clock);
    let executor = RetryExecutor::new("elevenlabs_tts", RetryPolicy::new(), &context);
    let calls = AtomicU32::new(0);
    let stopwatch = clock.stopwatch();

    let error = executor
        .run(|| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err::<(), _>(service_unavailable()) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::Relaxed), 3);
    assert_eq!(error.cause(), TerminalCause::Exhausted);
    assert_eq!(error.attempts_used(), 3);
    assert!(error.retriable());
    assert_eq!(
        error.classification(),
        ErrorClassification::Transient(TransientKind::ServiceUnavailable)
    );
    assert_eq!(scheduled_delays(&events), vec![Duration::from_secs(5), Duration::from_secs(10)]);
    assert_eq!(stopwatch.elapsed(), Duration::from_secs(15));
}

#[tokio::test]
async fn terminal_failure_is_reported_once() {
    let clock = ClockControl::new().auto_advance_timers(true).to_clock();
    let (context, events) = context(&clock);
    let executor = RetryExecutor::new("elevenlabs_tts", RetryPolicy::new(), &context);

    let _ = executor.run(|| async { Err::<(), _>(service_unavailable()) }).await;

    let events = events.lock().unwrap();
    let terminal: Vec<_> = events.iter().filter(|e| e.name() == "call_terminally_failed").collect();
    assert_eq!(terminal.len(), 1);
    assert!(matches!(
        terminal[0],
        ResilienceEvent::CallTerminallyFailed {
            attempts_used: 3,
            retriable: true,
            ..
        }
    ));
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let clock = ClockControl::new().auto_advance_timers(true).to_clock();
    let (context, events) = context(&clock);
    let executor = RetryExecutor::new("openai_llm", RetryPolicy::new().max_attempts(4), &context);
    let calls = AtomicU32::new(0);

    let result = executor
        .run(|| {
            let attempt = calls.fetch_add(1, Ordering::Relaxed) + 1;
            async move {
                if attempt < 3 {
                    Err(ClassifiedError::from_condition(FaultCondition::Timeout, "timed out"))
                } else {
                    Ok("hello")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "hello");
    assert_eq!(calls.load(Ordering::Relaxed), 3);
    assert_eq!(scheduled_delays(&events), vec![Duration::from_secs(5), Duration::from_secs(10)]);
    assert!(!events.lock().unwrap().iter().any(|e| e.name() == "call_terminally_failed"));
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let clock = ClockControl::new().auto_advance_timers(true).to_clock();
    let (context, events) = context(&clock);
    let executor = RetryExecutor::new("elevenlabs_tts", RetryPolicy::new(), &context);
    let calls = AtomicU32::new(0);
    let stopwatch = clock.stopwatch();

    let error = executor
        .run(|| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err::<(), _>(ClassifiedError::from_condition(FaultCondition::HttpStatus(401), "invalid api key")) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert_eq!(error.cause(), TerminalCause::Permanent);
    assert!(!error.retriable());
    assert_eq!(
        error.classification(),
        ErrorClassification::Permanent(PermanentKind::Authentication)
    );
    assert_eq!(error.last_error().message(), "invalid api key");
    assert!(scheduled_delays(&events).is_empty());
    assert_eq!(stopwatch.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn max_delay_caps_backoff() {
    let clock = ClockControl::new().auto_advance_timers(true).to_clock();
    let (context, events) = context(&clock);
    let policy = RetryPolicy::new().max_attempts(4).max_delay(Duration::from_secs(8));
    let executor = RetryExecutor::new("twilio", policy, &context);

    let _ = executor.run(|| async { Err::<(), _>(service_unavailable()) }).await;

    assert_eq!(
        scheduled_delays(&events),
        vec![Duration::from_secs(5), Duration::from_secs(8), Duration::from_secs(8)]
    );
}

#[tokio::test]
async fn shutdown_interrupts_backoff() {
    let clock = Clock::new_frozen();
    let shutdown = ShutdownToken::new();
    let (context, _events) = context(&clock);
    let context = context.shutdown_token(shutdown.clone());
    let executor = RetryExecutor::new("elevenlabs_tts", RetryPolicy::new(), &context);
    let calls = AtomicU32::new(0);

    shutdown.trigger();
    let error = executor
        .run(|| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err::<(), _>(service_unavailable()) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert_eq!(error.cause(), TerminalCause::Interrupted);
    assert_eq!(error.attempts_used(), 1);
}

#[tokio::test]
async fn io_errors_are_classified() {
    let clock = ClockControl::new().auto_advance_timers(true).to_clock();
    let (context, _events) = context(&clock);
    let executor = RetryExecutor::new("twilio", RetryPolicy::new().max_attempts(2), &context);
    let calls = AtomicU32::new(0);

    let error = executor
        .run(|| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err::<(), ClassifiedError>(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into()) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::Relaxed), 2);
    assert_eq!(error.classification(), ErrorClassification::Transient(TransientKind::NetworkError));
}
