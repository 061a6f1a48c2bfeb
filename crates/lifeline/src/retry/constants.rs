// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Delay before the second attempt: 5 seconds.
pub(super) const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);

/// Total number of attempts, including the first one: 3.
pub(super) const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Growth factor between consecutive delays: each delay doubles the previous one.
pub(super) const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Smallest accepted growth factor. Delays never shrink.
pub(super) const MIN_BACKOFF_MULTIPLIER: f64 = 1.0;
