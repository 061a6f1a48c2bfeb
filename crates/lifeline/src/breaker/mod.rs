// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-service circuit breakers.
//!
//! A [`CircuitBreaker`] wraps the calls to one external service. After `failure_threshold`
//! consecutive failed calls it opens and rejects further calls with [`CircuitOpenError`] so a
//! failing dependency is isolated instead of tying up the caller.
//!
//! ```text
//!            failure_threshold failures                   open_timeout elapsed, next call
//!  Closed ─────────────────────────────────▶ Open ──────────────────────────────────────▶ HalfOpen
//!    ▲  ▲                                    │  ▲                                             │
//!    │  └──────── healthy probe (reset) ─────┘  └──────────────── any failure ────────────────┤
//!    └─────────────────────────────── success_threshold successes ─────────────────────────────┘
//! ```

mod config;
mod constants;
mod error;
mod service;
mod state;

pub use config::BreakerConfig;
pub use error::{BreakerError, CircuitOpenError};
pub use service::CircuitBreaker;
pub use state::{BreakerSnapshot, CircuitState};
