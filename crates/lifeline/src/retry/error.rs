// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display, Formatter};

use crate::{ClassifiedError, ErrorClassification, ServiceName};

/// Why a [`RetryExecutor`][super::RetryExecutor] gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalCause {
    /// The operation failed with a permanent error. It was not retried.
    Permanent,
    /// Every attempt failed with a transient error.
    Exhausted,
    /// Shutdown was signaled while waiting for the next attempt.
    Interrupted,
}

impl Display for TerminalCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Permanent => "permanent failure",
            Self::Exhausted => "retries exhausted",
            Self::Interrupted => "interrupted by shutdown",
        })
    }
}

/// The final verdict of a [`RetryExecutor`][super::RetryExecutor] run that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("call to '{service}' failed after {attempts_used} attempt(s): {cause}")]
pub struct TerminalError {
    service: ServiceName,
    attempts_used: u32,
    cause: TerminalCause,
    #[source]
    last_error: ClassifiedError,
}

impl TerminalError {
    pub(crate) fn new(service: ServiceName, attempts_used: u32, cause: TerminalCause, last_error: ClassifiedError) -> Self {
        Self {
            service,
            attempts_used,
            cause,
            last_error,
        }
    }

    /// The service that was called.
    #[must_use]
    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// How many times the operation was invoked.
    #[must_use]
    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    /// Why the executor gave up.
    #[must_use]
    pub fn cause(&self) -> TerminalCause {
        self.cause
    }

    /// `false` when the last failure was permanent, `true` otherwise.
    ///
    /// A retriable terminal error means that a later call may succeed.
    #[must_use]
    pub fn retriable(&self) -> bool {
        self.cause != TerminalCause::Permanent
    }

    /// Classification of the last failure.
    #[must_use]
    pub fn classification(&self) -> ErrorClassification {
        self.last_error.classification()
    }

    /// The last failure reported by the operation.
    #[must_use]
    pub fn last_error(&self) -> &ClassifiedError {
        &self.last_error
    }

    /// Consumes the error and returns the last failure reported by the operation.
    #[must_use]
    pub fn into_last_error(self) -> ClassifiedError {
        self.last_error
    }
}
