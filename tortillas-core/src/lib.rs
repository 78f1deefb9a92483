// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core orchestration engine for the Tortillas SWEB integration-test
//! harness: guest control, log analysis, scheduling, and configuration.
//!
//! The CLI binary (`tortillas`) is a thin consumer of this crate; every
//! fallible operation here returns [`errors::TortillasError`] rather than
//! printing or exiting directly.

pub mod config;
pub mod constants;
pub mod errors;
pub mod fsutil;
pub mod guest;
pub mod log;
pub mod rules;
pub mod scheduler;
pub mod snapshot;
pub mod status;
pub mod test_run;
#[cfg(test)]
mod test_support;
pub mod watchdog;

pub use config::TortillasConfig;
pub use errors::TortillasError;
pub use guest::{Arch, GuestController, GuestOptions};
pub use scheduler::SchedulerReport;
pub use snapshot::GoldenSnapshot;
pub use status::TestStatus;
pub use test_run::{TestResult, TestRun, TestSpec, TestSpecHeader};
