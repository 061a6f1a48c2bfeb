// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Consecutive failed calls that open a closed circuit.
pub(super) const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Consecutive successful half-open trials that close the circuit.
pub(super) const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// How long an open circuit rejects calls before letting a trial through.
pub(super) const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Smallest accepted threshold for both failures and successes.
pub(super) const MIN_THRESHOLD: u32 = 1;
