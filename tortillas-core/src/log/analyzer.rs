// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `LogAnalyzer`: reduces [`LogData`] plus a watchdog outcome to a
//! [`TestResult`] under the configured [`AnalyzeRule`] table (§4.3).

use super::parser::LogData;
use crate::rules::{AnalyzeMode, AnalyzeRule};
use crate::status::TestStatus;
use crate::test_run::{TestResult, TestSpec};
use crate::watchdog::WatchdogStatus;

const EXPECT_PREFIX: &str = crate::constants::TORTILLAS_EXPECT_PREFIX;

/// Apply `rules` (in configured order) to `log_data`, folding in
/// `watchdog_status`, to produce the terminal (for this attempt)
/// `TestResult`.
pub fn analyze(spec: &TestSpec, log_data: &LogData, watchdog_status: WatchdogStatus, rules: &[AnalyzeRule]) -> TestResult {
    if spec.header.disabled {
        return TestResult {
            status: TestStatus::Disabled,
            errors: Vec::new(),
            retry: false,
        };
    }

    let mut result = TestResult {
        status: TestStatus::Success,
        errors: Vec::new(),
        retry: false,
    };

    if watchdog_status == WatchdogStatus::Stopped {
        add_errors(
            &mut result,
            vec!["Test killed, because no more interrupts were coming".to_string()],
            None,
        );
    }

    if watchdog_status == WatchdogStatus::Timeout && !spec.header.expect_timeout {
        add_errors(
            &mut result,
            vec!["Test execution timeout".to_string()],
            Some(TestStatus::Timeout),
        );
    }

    for rule in rules {
        let logs = log_data.get(&rule.name);
        if logs.is_empty() {
            continue;
        }

        match rule.mode {
            AnalyzeMode::AddAsError => {
                add_errors(&mut result, logs.to_vec(), rule.set_status);
            }
            AnalyzeMode::AddAsErrorJoin => {
                add_errors(
                    &mut result,
                    vec![format!("```\n{}```\n", logs.concat())],
                    rule.set_status,
                );
            }
            AnalyzeMode::AddAsErrorLast => {
                // Source behavior: `logs[0:1]`, i.e. the *first* captured
                // line despite the "last" name (open question in §9, kept
                // as-is).
                add_errors(&mut result, logs[..1].to_vec(), rule.set_status);
            }
            AnalyzeMode::ExpectStdout => {
                check_expect_stdout(&mut result, logs, rule.set_status);
            }
            AnalyzeMode::ExitCodes => {
                check_exit_codes(&mut result, logs, &spec.expect_exit_codes(), rule.set_status);
            }
        }
    }

    result
}

/// `TestStatus` is applied only if `errors` is non-empty, and `PANIC` is
/// sticky (§4.3).
fn set_status(result: &mut TestResult, status: Option<TestStatus>) {
    let Some(status) = status else { return };
    if result.status == TestStatus::Panic {
        return;
    }
    result.status = status;
}

fn add_errors(result: &mut TestResult, errors: Vec<String>, status: Option<TestStatus>) {
    if errors.is_empty() {
        return;
    }
    result.errors.extend(errors);
    set_status(result, status);
}

fn check_expect_stdout(result: &mut TestResult, logs: &[String], status: Option<TestStatus>) {
    let stdout: Vec<&str> = logs
        .iter()
        .filter(|line| !line.starts_with(EXPECT_PREFIX))
        .map(String::as_str)
        .collect();

    let expectations = logs
        .iter()
        .filter_map(|line| line.strip_prefix(EXPECT_PREFIX));

    let mut missing = false;
    for expect in expectations {
        if !stdout.iter().any(|got| got.contains(expect.trim())) {
            result.errors.push(format!("Expected output: {expect}"));
            missing = true;
        }
    }

    if missing {
        let full_stdout: String = stdout.concat();
        result
            .errors
            .push(format!("Actual output:\n```\n{full_stdout}\n```"));
        set_status(result, status);
    }
}

fn check_exit_codes(
    result: &mut TestResult,
    logs: &[String],
    expect_exit_codes: &[i64],
    status: Option<TestStatus>,
) {
    if result.status == TestStatus::Panic {
        return;
    }

    if logs.is_empty() {
        result.errors.push("Missing exit code!".to_string());
        if result.status == TestStatus::Success {
            result.status = TestStatus::Failed;
        }
        return;
    }

    let mut unexpected = false;
    for raw in logs {
        let Ok(code) = raw.parse::<i64>() else {
            result
                .errors
                .push(format!("Failed to parse exit code {raw}"));
            result.status = TestStatus::Failed;
            result.retry = true;
            return;
        };

        if !expect_exit_codes.contains(&code) {
            result.errors.push(format!("Unexpected exit code {code}"));
            unexpected = true;
        }
    }

    if unexpected {
        let expected = expect_exit_codes
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        result
            .errors
            .push(format!("Expected exit code(s): {expected}"));
        set_status(result, status);
    }
}
