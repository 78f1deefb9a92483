// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering a finished [`SchedulerReport`] as a plain-text table and as the
//! Markdown summary file (§6, §10: "a thin, literal rendering of
//! already-typed `TestResult`s, not a design surface of its own").

use std::fmt::Write as _;
use tortillas_core::{SchedulerReport, TestStatus};

/// Print a one-line-per-run table to stdout, terminal statuses only.
pub fn print_summary(report: &SchedulerReport) {
    for run in &report.runs {
        println!(
            "{:<32} run {:<3} {:?}",
            run.spec.test_name, run.run_number, run.result.status
        );
    }

    let failures: Vec<_> = report
        .runs
        .iter()
        .filter(|r| r.result.status.is_failure())
        .collect();

    if !failures.is_empty() {
        println!();
        println!("failures:");
        for run in failures {
            println!("  {} (run {})", run.spec.test_name, run.run_number);
            println!("    log: {}/out.log", run.work_dir);
            for error in &run.result.errors {
                println!("    {error}");
            }
        }
    }

    println!();
    println!(
        "{} passed, {} failed, {} total",
        report
            .runs
            .iter()
            .filter(|r| r.result.status == TestStatus::Success)
            .count(),
        failures_count(report),
        report.runs.len()
    );
}

fn failures_count(report: &SchedulerReport) -> usize {
    report
        .runs
        .iter()
        .filter(|r| r.result.status.is_failure())
        .count()
}

/// Render the same report as a Markdown document, written to
/// `tortillas_summary.md` next to the build directory.
pub fn render_markdown(report: &SchedulerReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Tortillas summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "| test | run | status |");
    let _ = writeln!(out, "| --- | --- | --- |");
    for run in &report.runs {
        let _ = writeln!(
            out,
            "| {} | {} | {:?} |",
            run.spec.test_name, run.run_number, run.result.status
        );
    }

    let failures: Vec<_> = report
        .runs
        .iter()
        .filter(|r| r.result.status.is_failure())
        .collect();

    if !failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Failures");
        for run in failures {
            let _ = writeln!(out);
            let _ = writeln!(out, "### {} (run {})", run.spec.test_name, run.run_number);
            let _ = writeln!(out, "log: `{}/out.log`", run.work_dir);
            let _ = writeln!(out);
            for error in &run.result.errors {
                let _ = writeln!(out, "- {error}");
            }
        }
    }

    out
}
