// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Suggested time between two health probes of the same service: 10 seconds.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Consecutive unhealthy probes after which a service is reported down.
pub(crate) const DEFAULT_DEPENDENCY_DOWN_THRESHOLD: u32 = 3;
