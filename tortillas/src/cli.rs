// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line surface (§6, §10): parsing only. All semantics live in
//! `tortillas-core`; this module just turns argv into typed values.

use camino::Utf8PathBuf;
use clap::Parser;
use tortillas_core::Arch;

/// Parallel integration-test harness for the SWEB teaching operating system.
#[derive(Debug, Parser)]
#[command(name = "tortillas", version, about)]
pub struct Cli {
    /// Root of the SWEB source tree (contains `userspace/tests` and the
    /// kernel build).
    pub sweb_src: Utf8PathBuf,

    /// Target architecture the test image was built for.
    #[arg(long, default_value = "x86_64", value_parser = parse_arch)]
    pub arch: Arch,

    /// Only run tests whose name starts with this glob prefix.
    #[arg(long, default_value = "")]
    pub test_filter: String,

    /// Restrict to tests tagged with one of these categories (repeatable).
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Restrict to tests carrying one of these tags (repeatable).
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Run each selected test this many times.
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Suppress the live progress output; print only the final summary.
    #[arg(long)]
    pub no_progress: bool,

    /// Skip rebuilding the kernel/userspace image before running.
    #[arg(long)]
    pub skip_build: bool,

    /// Skip golden-snapshot creation; reuse whatever snapshot already exists
    /// under the run directory.
    #[arg(long)]
    pub skip_setup: bool,

    /// Path to the top-level YAML config, relative to `sweb_src` unless
    /// absolute.
    #[arg(long)]
    pub config: Option<Utf8PathBuf>,
}

fn parse_arch(raw: &str) -> Result<Arch, String> {
    raw.parse()
}
