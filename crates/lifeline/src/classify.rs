// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::io;

use recoverable::{Recovery, RecoveryInfo};

/// Failure kinds that may clear up on their own and are worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientKind {
    /// The service did not answer in time.
    Timeout,
    /// The connection could not be established or was torn down mid-flight.
    NetworkError,
    /// The service answered but reported that it cannot serve requests right now.
    ServiceUnavailable,
}

/// Failure kinds that retrying cannot fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermanentKind {
    /// Credentials were rejected.
    Authentication,
    /// The request itself is malformed.
    InvalidPayload,
    /// The account has exhausted its quota or is being rate limited.
    QuotaExceeded,
    /// No classification rule matched the failure.
    ///
    /// Unknown failures are never retried so that an unexpected error cannot cause an
    /// endless retry loop.
    Unrecognized,
}

/// The tag carried by every failure of a service operation.
///
/// Retry and circuit breaker decisions switch on this tag and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClassification {
    /// The failure is retryable.
    Transient(TransientKind),
    /// The failure must not be retried.
    Permanent(PermanentKind),
}

impl ErrorClassification {
    /// Returns `true` if the failure is retryable.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns `true` if the failure must not be retried.
    #[must_use]
    pub fn is_permanent(self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    /// A short, stable, `snake_case` label suitable for logs and metric dimensions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient(TransientKind::Timeout) => "transient.timeout",
            Self::Transient(TransientKind::NetworkError) => "transient.network_error",
            Self::Transient(TransientKind::ServiceUnavailable) => "transient.service_unavailable",
            Self::Permanent(PermanentKind::Authentication) => "permanent.authentication",
            Self::Permanent(PermanentKind::InvalidPayload) => "permanent.invalid_payload",
            Self::Permanent(PermanentKind::QuotaExceeded) => "permanent.quota_exceeded",
            Self::Permanent(PermanentKind::Unrecognized) => "permanent.unrecognized",
        }
    }
}

impl Display for ErrorClassification {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw failure condition observed while talking to an external service.
///
/// This is the input of [`classify`]. Service adapters translate whatever their client library
/// reports into one of these conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCondition {
    /// The service answered with a non-success HTTP status code.
    HttpStatus(u16),
    /// The request timed out on the client side.
    Timeout,
    /// The connection was refused.
    ConnectionRefused,
    /// The connection was reset or aborted.
    ConnectionReset,
    /// The request was rejected before being sent because it is malformed.
    MalformedRequest,
    /// The client library reported quota exhaustion without an HTTP status.
    QuotaExceeded,
    /// Anything else.
    Other,
}

impl From<&io::Error> for FaultCondition {
    fn from(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => Self::ConnectionReset,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => Self::MalformedRequest,
            _ => Self::Other,
        }
    }
}

/// Maps a raw failure condition onto the error taxonomy.
///
/// | Condition                                   | Classification                    |
/// |---------------------------------------------|-----------------------------------|
/// | HTTP 502, 503                               | `Transient(ServiceUnavailable)`   |
/// | HTTP 408, 504, client timeout               | `Transient(Timeout)`              |
/// | connection refused or reset                 | `Transient(NetworkError)`         |
/// | HTTP 401, 403                               | `Permanent(Authentication)`       |
/// | HTTP 400, 422, malformed request            | `Permanent(InvalidPayload)`       |
/// | HTTP 429, quota exhaustion                  | `Permanent(QuotaExceeded)`        |
/// | anything else                               | `Permanent(Unrecognized)`         |
///
/// # Examples
///
/// ```
/// use lifeline::{ErrorClassification, FaultCondition, TransientKind, classify};
///
/// assert_eq!(
///     classify(&FaultCondition::HttpStatus(503)),
///     ErrorClassification::Transient(TransientKind::ServiceUnavailable)
/// );
/// assert!(classify(&FaultCondition::HttpStatus(418)).is_permanent());
/// ```
#[must_use]
pub fn classify(condition: &FaultCondition) -> ErrorClassification {
    use ErrorClassification::{Permanent, Transient};

    match *condition {
        FaultCondition::HttpStatus(502 | 503) => Transient(TransientKind::ServiceUnavailable),
        FaultCondition::HttpStatus(408 | 504) | FaultCondition::Timeout => Transient(TransientKind::Timeout),
        FaultCondition::ConnectionRefused | FaultCondition::ConnectionReset => Transient(TransientKind::NetworkError),
        FaultCondition::HttpStatus(401 | 403) => Permanent(PermanentKind::Authentication),
        FaultCondition::HttpStatus(400 | 422) | FaultCondition::MalformedRequest => Permanent(PermanentKind::InvalidPayload),
        FaultCondition::HttpStatus(429) | FaultCondition::QuotaExceeded => Permanent(PermanentKind::QuotaExceeded),
        FaultCondition::HttpStatus(_) | FaultCondition::Other => Permanent(PermanentKind::Unrecognized),
    }
}

/// A failure of a service operation, tagged with its classification.
///
/// Service operations handed to [`RetryExecutor`][crate::retry::RetryExecutor] or
/// [`CircuitBreaker`][crate::breaker::CircuitBreaker] report failures as this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({classification})")]
pub struct ClassifiedError {
    classification: ErrorClassification,
    condition: Option<FaultCondition>,
    message: Cow<'static, str>,
}

impl ClassifiedError {
    /// Classifies a raw condition and wraps it together with a message.
    #[must_use]
    pub fn from_condition(condition: FaultCondition, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            classification: classify(&condition),
            condition: Some(condition),
            message: message.into(),
        }
    }

    /// Creates a retryable failure.
    #[must_use]
    pub fn transient(kind: TransientKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            classification: ErrorClassification::Transient(kind),
            condition: None,
            message: message.into(),
        }
    }

    /// Creates a failure that must not be retried.
    #[must_use]
    pub fn permanent(kind: PermanentKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            classification: ErrorClassification::Permanent(kind),
            condition: None,
            message: message.into(),
        }
    }

    /// Creates a failure for which no classification is known. It is treated as permanent.
    #[must_use]
    pub fn unclassified(message: impl Into<Cow<'static, str>>) -> Self {
        Self::permanent(PermanentKind::Unrecognized, message)
    }

    /// The classification of this failure.
    #[must_use]
    pub fn classification(&self) -> ErrorClassification {
        self.classification
    }

    /// The raw condition the failure was classified from, if any.
    #[must_use]
    pub fn condition(&self) -> Option<FaultCondition> {
        self.condition
    }

    /// The human readable failure description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&io::Error> for ClassifiedError {
    fn from(error: &io::Error) -> Self {
        Self::from_condition(FaultCondition::from(error), error.to_string())
    }
}

impl From<io::Error> for ClassifiedError {
    fn from(error: io::Error) -> Self {
        Self::from(&error)
    }
}

impl Recovery for ClassifiedError {
    fn recovery(&self) -> RecoveryInfo {
        match self.classification {
            ErrorClassification::Transient(TransientKind::ServiceUnavailable) => RecoveryInfo::unavailable(),
            ErrorClassification::Transient(_) => RecoveryInfo::retry(),
            ErrorClassification::Permanent(_) => RecoveryInfo::never(),
        }
    }
}
