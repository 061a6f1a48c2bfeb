// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use opentelemetry::InstrumentationScope;
use opentelemetry::metrics::{Counter, Meter, MeterProvider};

const METER_NAME: &str = "lifeline";
const VERSION: &str = "v0.1.0";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

/// Key used to annotate the name of the pipeline that owns the component.
pub(crate) const PIPELINE_NAME: &str = "resilience.pipeline.name";

/// Key used to annotate the protected external service.
///
/// Values reported under this dimension are the configured [`ServiceName`][crate::ServiceName]s.
pub(crate) const SERVICE_NAME: &str = "resilience.service.name";

/// Key used to annotate the component that emitted the event: `retry`, `circuit_breaker` or `health`.
pub(crate) const COMPONENT_NAME: &str = "resilience.component.name";

/// Key used to annotate the specific resilience event being emitted.
///
/// Examples: `retry_scheduled`, `circuit_opened`, `dependency_down`.
pub(crate) const EVENT_NAME: &str = "resilience.event.name";

pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

pub(crate) fn create_resilience_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter("resilience.event")
        .with_description("Emitted upon the occurrence of a resilience event.")
        .with_unit("u64")
        .build()
}
