// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide constants shared by every component.
//!
//! These mirror the handful of magic values the Python original kept as
//! module-level globals (`tortillas/constants.py`); everything else is passed
//! down explicitly instead of being read from a global.

/// Interrupt vector SWEB uses for its `int_tortillas_bootup` / `int_tortillas_finished`
/// syscalls. Decimal, not hex — matches the guest's `int $80` convention.
pub const SYSCALL_VECTOR: u32 = 80;

/// Prefix a captured stdout line must start with to be treated as an expectation
/// rather than observed output, for the `expect_stdout` analyze mode.
pub const TORTILLAS_EXPECT_PREFIX: &str = "TORTILLAS EXPECT: ";

/// Label `savevm`/`loadvm` are invoked with for the golden snapshot.
pub const SNAPSHOT_VM_STATE_LABEL: &str = "tortillas-snapshot";

/// Filename the golden overlay is copied to under the shared run directory.
pub const SNAPSHOT_IMAGE_NAME: &str = "SWEB-snapshot.qcow2";

/// Default retry cap applied by the scheduler when a run reports `retry = true`.
///
/// The source is effectively unbounded here; we cap it so persistent log
/// corruption can't loop a run forever.
pub const DEFAULT_RETRY_CAP: u32 = 2;

/// Sleep issued after every monitor command, to dodge the documented QEMU
/// race where back-to-back writes get coalesced/mis-received.
pub const MONITOR_SETTLE: std::time::Duration = std::time::Duration::from_millis(200);

/// Hold time passed to each `sendkey` command.
pub const SENDKEY_HOLD_MS: u32 = 100;

/// Poll interval used by the interrupt watchdog while tailing the trace.
pub const WATCHDOG_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);

/// Directory (relative to the SWEB source tree) that test sources live
/// under, and the glob suffix used to discover them.
pub const TEST_FOLDER_PATH: &str = "userspace/tests";

/// Filename of the top-level YAML config, relative to the SWEB source tree
/// unless overridden on the CLI.
pub const TORTILLAS_CONFIG_PATH: &str = "tortillas_config.yml";

/// Number of consecutive polls with no new bytes before the watchdog gives up
/// and reports `Stopped`.
pub const WATCHDOG_IDLE_THRESHOLD: u32 = 10;
