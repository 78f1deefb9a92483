// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `Scheduler`: runs a queue of [`TestRun`]s across a bounded worker pool
//! with retry and progress accounting (§4.7).

use crate::config::TortillasConfig;
use crate::constants::SYSCALL_VECTOR;
use crate::errors::TortillasError;
use crate::fsutil::reset_dir;
use crate::guest::{Arch, GuestController, GuestOptions};
use crate::log;
use crate::snapshot::GoldenSnapshot;
use crate::status::TestStatus;
use crate::test_run::TestRun;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn};

/// Final outcome of a whole scheduler run.
pub struct SchedulerReport {
    pub runs: Vec<TestRun>,
    pub success: bool,
}

struct WorkerContext {
    config: Arc<TortillasConfig>,
    golden: Arc<GoldenSnapshot>,
    arch: Arch,
    retry_cap: u32,
}

struct SharedQueue {
    // Popped from the end: a LIFO stack, per §4.7's "queue diversity" note.
    queue: Vec<TestRun>,
    active: usize,
    completed: Vec<TestRun>,
}

/// Run every `run` in `runs` across `config.threads` worker threads, retrying
/// up to `retry_cap` times when a run reports `retry = true`.
pub fn run(
    mut runs: Vec<TestRun>,
    config: Arc<TortillasConfig>,
    golden: Arc<GoldenSnapshot>,
    arch: Arch,
    retry_cap: u32,
) -> SchedulerReport {
    // Stable sort by spec name descending, then by run number, to improve
    // queue diversity when `repeat > 1` (§4.7).
    runs.sort_by(|a, b| {
        b.spec
            .test_name
            .cmp(&a.spec.test_name)
            .then(a.run_number.cmp(&b.run_number))
    });

    let threads = config.threads.max(1);
    let shared = Arc::new((
        Mutex::new(SharedQueue {
            queue: runs,
            active: 0,
            completed: Vec::new(),
        }),
        Condvar::new(),
    ));
    let ctx = Arc::new(WorkerContext {
        config,
        golden,
        arch,
        retry_cap,
    });

    info!(threads, "starting scheduler");
    std::thread::scope(|scope| {
        for _ in 0..threads {
            let shared = Arc::clone(&shared);
            let ctx = Arc::clone(&ctx);
            scope.spawn(move || worker_loop(&shared, &ctx));
        }
    });

    let (lock, _) = &*shared;
    let mut state = lock.lock().expect("scheduler mutex poisoned");
    let runs = std::mem::take(&mut state.completed);
    let success = !runs.iter().any(|r| r.result.status.is_failure());
    SchedulerReport { runs, success }
}

fn worker_loop(shared: &Arc<(Mutex<SharedQueue>, Condvar)>, ctx: &Arc<WorkerContext>) {
    let (lock, cvar) = &**shared;
    loop {
        let mut guard = lock.lock().expect("scheduler mutex poisoned");
        let run = loop {
            if let Some(run) = guard.queue.pop() {
                break Some(run);
            }
            if guard.active == 0 {
                break None;
            }
            guard = cvar.wait(guard).expect("scheduler mutex poisoned");
        };

        let Some(mut run) = run else {
            cvar.notify_all();
            return;
        };
        guard.active += 1;
        drop(guard);

        let span = info_span!("run", test = %run.spec.test_name, run = run.run_number);
        let _entered = span.enter();
        run_one(&mut run, ctx);
        drop(_entered);

        let mut guard = lock.lock().expect("scheduler mutex poisoned");
        guard.active -= 1;
        if run.result.retry && run.retries < ctx.retry_cap {
            warn!(
                test = %run.spec.test_name,
                retries = run.retries + 1,
                "retrying run after transient corruption"
            );
            run.retries += 1;
            run.result.reset_for_retry();
            guard.queue.push(run);
        } else {
            guard.completed.push(run);
        }
        cvar.notify_all();
    }
}

fn run_one(run: &mut TestRun, ctx: &WorkerContext) {
    match execute_run(run, ctx) {
        Ok(()) => {}
        Err(e) => {
            error!(error = %e, "run failed with a setup/io error");
            run.result.status = TestStatus::Failed;
            run.result.errors.push(e.to_string());
            run.result.retry = false;
        }
    }
}

fn execute_run(run: &mut TestRun, ctx: &WorkerContext) -> Result<(), TortillasError> {
    reset_dir(&run.work_dir)?;
    let disk = run.work_dir.join("SWEB-snapshot.qcow2");
    fs_err::copy(&ctx.golden.image_path, &disk).map_err(|source| TortillasError::Io {
        context: format!("copying golden snapshot into {}", run.work_dir),
        source,
    })?;

    let mut guest = match GuestController::open(GuestOptions {
        run_dir: &run.work_dir,
        disk_image: &disk,
        arch: ctx.arch,
        vm_state_label: Some(&ctx.golden.vm_state_label),
        watchdog_enabled: true,
        spawn_override: None,
    }) {
        Ok(guest) => guest,
        Err(e) => {
            warn!(error = %e, "guest failed to start, will retry");
            run.result.retry = true;
            return Ok(());
        }
    };

    if !guest.is_alive() {
        warn!("guest exited immediately after start, will retry");
        run.result.retry = true;
        return Ok(());
    }

    info!("starting test execution");
    guest.type_input(&format!("{}.sweb\n", run.spec.test_name))?;

    let timeout = run.spec.effective_timeout(ctx.config.default_test_timeout_secs);
    let mut constraints = HashMap::new();
    constraints.insert(
        ctx.arch.return_register().to_string(),
        ctx.config.sc_tortillas_finished,
    );

    let watchdog_status = guest
        .watchdog_mut()
        .expect("watchdog enabled above")
        .wait_until(SYSCALL_VECTOR, &constraints, Duration::from_secs(timeout))
        .map_err(|source| TortillasError::Setup {
            context: "watching for test-finished interrupt".to_string(),
            source,
        })?;

    // Let the guest flush its debug output before we read it back.
    std::thread::sleep(Duration::from_millis(500));

    let log_data = log::parse(&run.work_dir.join("out.log"), &ctx.config.parse_rules)?;
    for (rule, captures) in log_data.iter() {
        debug!(rule, ?captures, "parsed rule captures");
    }
    run.result = log::analyze(
        &run.spec,
        &log_data,
        watchdog_status,
        &ctx.config.analyze_rules,
    );

    guest.type_input("exit\n")?;
    std::thread::sleep(Duration::from_millis(200));
    guest.close()?;

    info!(status = ?run.result.status, "run complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TestStatus;
    use crate::test_run::{TestResult, TestRun};
    use pretty_assertions::assert_eq;

    fn sort_runs(mut runs: Vec<TestRun>) -> Vec<TestRun> {
        runs.sort_by(|a, b| {
            b.spec
                .test_name
                .cmp(&a.spec.test_name)
                .then(a.run_number.cmp(&b.run_number))
        });
        runs
    }

    #[test]
    fn queue_sort_is_name_descending_then_run_ascending() {
        let runs = sort_runs(vec![
            fake_run("alpha", 1),
            fake_run("bravo", 0),
            fake_run("alpha", 0),
        ]);
        let order: Vec<_> = runs.iter().map(|r| (r.spec.test_name.clone(), r.run_number)).collect();
        assert_eq!(
            order,
            vec![
                ("bravo".to_string(), 0),
                ("alpha".to_string(), 0),
                ("alpha".to_string(), 1),
            ]
        );
    }

    #[test]
    fn retry_is_bounded_by_cap() {
        crate::test_support::init_tracing();
        let retry_cap = 2;
        let mut run = fake_run("flaky", 0);
        run.result.retry = true;

        // Mirrors the worker_loop re-enqueue decision without spinning up
        // real threads or guests.
        for expected_retries in 1..=retry_cap {
            assert!(run.result.retry && run.retries < retry_cap);
            run.retries += 1;
            run.result.reset_for_retry();
            run.result.retry = true;
            assert_eq!(run.retries, expected_retries);
        }
        assert!(!(run.result.retry && run.retries < retry_cap));
    }

    #[test]
    fn report_success_is_false_when_any_run_failed() {
        let mut passed = fake_run("ok", 0);
        passed.result.status = TestStatus::Success;
        let mut failed = fake_run("bad", 0);
        failed.result.status = TestStatus::Panic;

        let runs = vec![passed, failed];
        let success = !runs.iter().any(|r| r.result.status.is_failure());
        assert!(!success);
    }

    fn fake_run(name: &str, run_number: u32) -> TestRun {
        use crate::test_run::{TestSpec, TestSpecHeader};
        use camino::Utf8PathBuf;
        use std::collections::BTreeSet;

        let spec = TestSpec {
            test_name: name.to_string(),
            source_path: Utf8PathBuf::from(format!("userspace/tests/{name}.c")),
            header: TestSpecHeader {
                category: "unit".to_string(),
                description: "fake".to_string(),
                disabled: false,
                timeout: 0,
                expect_timeout: false,
                expect_exit_codes: vec![],
                tags: BTreeSet::new(),
            },
        };
        TestRun {
            work_dir: Utf8PathBuf::from(format!("/tmp/{name}-{run_number}")),
            result: TestResult::not_run(),
            retries: 0,
            run_number,
            spec,
        }
    }
}
