// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retrying transient failures with exponential backoff.
//!
//! A [`RetryExecutor`] invokes a service operation, inspects the [`ErrorClassification`][crate::ErrorClassification]
//! of each failure and either retries after the next delay of its [`RetryPolicy`] or gives up
//! with a [`TerminalError`].
//!
//! ```text
//! attempt 1 ── transient ──▶ wait initial_delay ──▶ attempt 2 ── transient ──▶ wait initial_delay × m ──▶ attempt 3
//!     │                                                │                                                  │
//!     └─ permanent ──▶ TerminalError (Permanent)       └─ success ──▶ Ok                                   └─ transient ──▶ TerminalError (Exhausted)
//! ```

mod constants;
mod error;
mod executor;
mod policy;

pub use error::{TerminalCause, TerminalError};
pub use executor::RetryExecutor;
pub use policy::RetryPolicy;
