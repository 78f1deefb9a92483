// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry point for the `tortillas` binary: argument parsing, process wiring,
//! and top-level error reporting (§10). Everything that can be tested lives
//! in `tortillas-core`; this crate only glues it together.

mod cli;
mod report;

use camino::Utf8PathBuf;
use clap::Parser;
use cli::Cli;
use color_eyre::eyre::{Result, WrapErr};
use std::sync::Arc;
use tortillas_core::config::test_spec::{discover_test_specs, filter_test_specs};
use tortillas_core::constants::{DEFAULT_RETRY_CAP, TORTILLAS_CONFIG_PATH};
use tortillas_core::{snapshot, scheduler, TestRun, TortillasConfig};

fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();
    let exit_success = run(cli)?;
    std::process::exit(if exit_success { 0 } else { 1 });
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn run(cli: Cli) -> Result<bool> {
    let config_path = match &cli.config {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => cli.sweb_src.join(path),
        None => cli.sweb_src.join(TORTILLAS_CONFIG_PATH),
    };
    let config = TortillasConfig::load(&config_path)
        .wrap_err_with(|| format!("loading config from {config_path}"))?;

    if !cli.skip_build {
        build_sweb(&cli.sweb_src)?;
    }

    let specs = discover_test_specs(&cli.sweb_src, &cli.test_filter)
        .wrap_err("discovering test specs")?;
    let specs = filter_test_specs(specs, &cli.categories, &cli.tags);
    if specs.is_empty() {
        tracing::warn!("no tests matched the given filters");
    }

    let build_dir = cli.sweb_src.join("build");
    let runs_root = build_dir.join("tortillas_runs");

    let golden = if cli.skip_setup {
        snapshot::GoldenSnapshot {
            image_path: runs_root.join(tortillas_core::constants::SNAPSHOT_IMAGE_NAME),
            vm_state_label: tortillas_core::constants::SNAPSHOT_VM_STATE_LABEL.to_string(),
        }
    } else {
        let base_image = cli.sweb_src.join("build").join("SWEB.qcow2");
        snapshot::create_snapshot(&base_image, &runs_root, cli.arch, &config)
            .wrap_err("creating golden snapshot")?
    };

    let mut runs = Vec::new();
    for spec in &specs {
        for run_number in 0..cli.repeat {
            runs.push(TestRun::new(spec.clone(), run_number, &runs_root));
        }
    }

    let report = scheduler::run(
        runs,
        Arc::new(config),
        Arc::new(golden),
        cli.arch,
        DEFAULT_RETRY_CAP,
    );

    if !cli.no_progress {
        report::print_summary(&report);
    }

    write_markdown_summary(&build_dir, &report)?;

    Ok(report.success)
}

/// Rebuild the kernel/userspace test image via the SWEB build system.
/// Skippable with `--skip-build` once an image is already in place.
fn build_sweb(sweb_src: &Utf8PathBuf) -> Result<()> {
    tracing::info!("building kernel and userspace test image");
    let status = std::process::Command::new("make")
        .arg("all")
        .current_dir(sweb_src)
        .status()
        .wrap_err("spawning SWEB build")?;

    if !status.success() {
        return Err(color_eyre::eyre::eyre!("SWEB build failed with {status}"));
    }
    Ok(())
}

fn write_markdown_summary(
    build_dir: &Utf8PathBuf,
    report: &tortillas_core::SchedulerReport,
) -> Result<()> {
    let path = build_dir.join("tortillas_summary.md");
    fs_err::create_dir_all(build_dir)
        .wrap_err_with(|| format!("creating build directory {build_dir}"))?;
    fs_err::write(&path, report::render_markdown(report))
        .wrap_err_with(|| format!("writing summary to {path}"))?;
    Ok(())
}
