// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The terminal/non-terminal status vocabulary shared by [`crate::test_run::TestResult`]
//! and the analyzer rule table.

use serde::Deserialize;

/// Outcome of a single test run.
///
/// `NotRun` is the only non-terminal value; every other variant is a final
/// verdict once a [`crate::test_run::TestResult`] is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    NotRun,
    Success,
    Failed,
    Panic,
    Timeout,
    Disabled,
}

impl TestStatus {
    /// Whether this status counts as a suite-wide failure for §4.7's
    /// termination rule (`success = true` iff no run is terminal-failing).
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Panic | Self::Timeout)
    }
}
