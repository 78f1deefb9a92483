// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `TestSpec`, `TestResult`, and `TestRun`: the data model bound together by
//! a single queued test execution (§3).

use crate::status::TestStatus;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Immutable per-test metadata, parsed once from a test source file's YAML
/// header and never mutated afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSpecHeader {
    pub category: String,
    pub description: String,

    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub timeout: u64,
    #[serde(default)]
    pub expect_timeout: bool,
    #[serde(default)]
    pub expect_exit_codes: Vec<i64>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// A `TestSpecHeader` bound to the test it was parsed from.
#[derive(Debug, Clone)]
pub struct TestSpec {
    pub test_name: String,
    pub source_path: Utf8PathBuf,
    pub header: TestSpecHeader,
}

impl TestSpec {
    pub fn category(&self) -> &str {
        &self.header.category
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.header.tags
    }

    /// `expect_exit_codes`, defaulting to `{0}` when empty/absent.
    pub fn expect_exit_codes(&self) -> Vec<i64> {
        if self.header.expect_exit_codes.is_empty() {
            vec![0]
        } else {
            self.header.expect_exit_codes.clone()
        }
    }

    /// Effective timeout for this run: the spec's own value if non-zero,
    /// else the scheduler-wide default.
    pub fn effective_timeout(&self, default_secs: u64) -> u64 {
        if self.header.timeout != 0 {
            self.header.timeout
        } else {
            default_secs
        }
    }
}

/// Mutable while a run is in progress, frozen once the run completes.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub status: TestStatus,
    pub errors: Vec<String>,
    pub retry: bool,
}

impl TestResult {
    pub fn not_run() -> Self {
        Self {
            status: TestStatus::NotRun,
            errors: Vec::new(),
            retry: false,
        }
    }

    /// Reset back to a fresh, unexecuted state ahead of a retry (§4.7).
    pub fn reset_for_retry(&mut self) {
        self.status = TestStatus::NotRun;
        self.errors.clear();
        self.retry = false;
    }
}

impl Default for TestResult {
    fn default() -> Self {
        Self::not_run()
    }
}

/// Binds one `TestSpec` and a `run_number` to a working directory and its
/// (mutable, owner-only) result. Identified by `(test_name, run_number)`.
#[derive(Debug, Clone)]
pub struct TestRun {
    pub spec: TestSpec,
    pub run_number: u32,
    pub work_dir: Utf8PathBuf,
    pub result: TestResult,
    /// Times this run has been re-enqueued after a transient-corruption
    /// retry (§4.7 / §8 invariant 11). Scheduler bookkeeping, not part of
    /// the on-the-wire data model.
    pub retries: u32,
}

impl TestRun {
    pub fn new(spec: TestSpec, run_number: u32, runs_root: &Utf8Path) -> Self {
        let work_dir = if run_number == 0 {
            runs_root.join(&spec.test_name)
        } else {
            runs_root.join(format!("{}-{}", spec.test_name, run_number))
        };
        Self {
            spec,
            run_number,
            work_dir,
            result: TestResult::not_run(),
            retries: 0,
        }
    }

    pub fn id(&self) -> (String, u32) {
        (self.spec.test_name.clone(), self.run_number)
    }
}
