// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Background health probing and breaker recovery.
//!
//! A [`HealthProber`] runs one loop per service. Each loop periodically calls a lightweight
//! probe, reports the [`HealthProbeResult`], and resets the service's
//! [`CircuitBreaker`][crate::breaker::CircuitBreaker] when a healthy probe arrives while the
//! breaker is open.

mod constants;
mod error;
mod prober;
mod result;
mod task;

pub use constants::DEFAULT_PROBE_INTERVAL;
#[cfg(any(feature = "serde", test))]
pub(crate) use constants::DEFAULT_DEPENDENCY_DOWN_THRESHOLD;
pub use error::ProberError;
pub use prober::HealthProber;
pub use result::HealthProbeResult;
