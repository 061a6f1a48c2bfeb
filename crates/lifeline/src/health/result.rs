// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::SystemTime;

/// The outcome of one health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HealthProbeResult {
    /// Whether the service answered the probe successfully.
    pub healthy: bool,
    /// When the probe completed.
    pub checked_at: SystemTime,
}

impl HealthProbeResult {
    /// Creates a probe result.
    #[must_use]
    pub fn new(healthy: bool, checked_at: SystemTime) -> Self {
        Self { healthy, checked_at }
    }
}
