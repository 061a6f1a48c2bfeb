// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use recoverable::{Recovery, RecoveryInfo};

use crate::ServiceName;
use crate::retry::{TerminalCause, TerminalError};

/// Returned when an open circuit rejects a call. The operation was not invoked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit for '{service}' is open, next trial allowed in {remaining:?}")]
pub struct CircuitOpenError {
    service: ServiceName,
    remaining: Duration,
}

impl CircuitOpenError {
    pub(crate) fn new(service: ServiceName, remaining: Duration) -> Self {
        Self { service, remaining }
    }

    /// The isolated service.
    #[must_use]
    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Time left until the circuit lets a trial call through.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.remaining
    }
}

/// The error returned by [`CircuitBreaker::execute`][super::CircuitBreaker::execute].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BreakerError {
    /// The circuit is open and the call was rejected.
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// The call was attempted and failed.
    #[error(transparent)]
    Terminal(#[from] TerminalError),
}

impl BreakerError {
    /// The service that was called.
    #[must_use]
    pub fn service(&self) -> &ServiceName {
        match self {
            Self::Open(e) => e.service(),
            Self::Terminal(e) => e.service(),
        }
    }

    /// Returns `true` when the call was rejected by an open circuit.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

impl Recovery for BreakerError {
    fn recovery(&self) -> RecoveryInfo {
        match self {
            Self::Open(e) => RecoveryInfo::unavailable().delay(e.remaining()),
            Self::Terminal(e) => match e.cause() {
                TerminalCause::Exhausted => e.last_error().recovery(),
                TerminalCause::Permanent | TerminalCause::Interrupted => RecoveryInfo::never(),
            },
        }
    }
}
