// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ServiceName;

/// Returned when a probe loop cannot be started.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProberError {
    /// A probe loop is already running for the service.
    #[error("a health probe loop is already running for '{0}'")]
    AlreadyRunning(ServiceName),

    /// `start` was called outside of a Tokio runtime.
    #[error("health probing requires a Tokio runtime")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
