// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `Snapshotter`: boots the guest exactly once and persists a golden,
//! read-only (base image, vm-state label) pair for every worker to fork
//! from (§4.6).

use crate::config::TortillasConfig;
use crate::constants::{SNAPSHOT_IMAGE_NAME, SNAPSHOT_VM_STATE_LABEL, SYSCALL_VECTOR};
use crate::errors::TortillasError;
use crate::fsutil::reset_dir;
use crate::guest::{Arch, GuestController, GuestOptions};
use crate::watchdog::WatchdogStatus;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::process::Command;
use std::time::Duration;
use tracing::{error, info};

/// The golden snapshot: a base disk image plus the vm-state label it was
/// saved under. Read-only once produced; shared by every worker.
#[derive(Debug, Clone)]
pub struct GoldenSnapshot {
    pub image_path: Utf8PathBuf,
    pub vm_state_label: String,
}

/// Boot `base_image` fresh, wait for the bootup signal interrupt, persist
/// the VM state, and copy the resulting overlay under `runs_root` as the
/// shared golden snapshot.
pub fn create_snapshot(
    base_image: &Utf8Path,
    runs_root: &Utf8Path,
    arch: Arch,
    config: &TortillasConfig,
) -> Result<GoldenSnapshot, TortillasError> {
    let snapshot_dir = runs_root.join("snapshot");
    reset_dir(&snapshot_dir)?;

    let overlay = snapshot_dir.join("SWEB.qcow2");
    create_overlay(base_image, &overlay)?;

    info!("booting guest to create golden snapshot");
    let mut guest = GuestController::open(GuestOptions {
        run_dir: &snapshot_dir,
        disk_image: &overlay,
        arch,
        vm_state_label: None,
        watchdog_enabled: true,
        spawn_override: None,
    })?;

    let return_reg = arch.return_register();
    let mut constraints = HashMap::new();
    constraints.insert(return_reg.to_string(), config.sc_tortillas_bootup);

    let status = guest
        .watchdog_mut()
        .expect("watchdog enabled above")
        .wait_until(
            SYSCALL_VECTOR,
            &constraints,
            Duration::from_secs(config.bootup_timeout_secs),
        )
        .map_err(|source| TortillasError::Setup {
            context: "watching for bootup interrupt".to_string(),
            source,
        })?;

    if status != WatchdogStatus::Ok {
        dump_debug_log(&snapshot_dir);
        return Err(TortillasError::Snapshot {
            reason: format!("bootup did not complete ({status:?})"),
        });
    }

    info!("bootup complete, persisting vm state");
    std::thread::sleep(Duration::from_millis(100));
    guest.monitor_command(&format!("savevm {SNAPSHOT_VM_STATE_LABEL}"))?;
    guest.close()?;

    let golden_path = runs_root.join(SNAPSHOT_IMAGE_NAME);
    fs_err::copy(&overlay, &golden_path).map_err(|source| TortillasError::Io {
        context: format!("copying snapshot overlay to {golden_path}"),
        source,
    })?;

    Ok(GoldenSnapshot {
        image_path: golden_path,
        vm_state_label: SNAPSHOT_VM_STATE_LABEL.to_string(),
    })
}

fn create_overlay(base_image: &Utf8Path, overlay: &Utf8Path) -> Result<(), TortillasError> {
    let status = Command::new("qemu-img")
        .args([
            "create",
            "-f",
            "qcow2",
            "-F",
            "qcow2",
            "-b",
            base_image.as_str(),
            overlay.as_str(),
        ])
        .status()
        .map_err(|source| TortillasError::Setup {
            context: "spawning qemu-img".to_string(),
            source,
        })?;

    if !status.success() {
        return Err(TortillasError::Snapshot {
            reason: format!("qemu-img create failed with {status}"),
        });
    }
    Ok(())
}

fn dump_debug_log(run_dir: &Utf8Path) {
    match fs_err::read_to_string(run_dir.join("out.log")) {
        Ok(contents) => error!(log = %contents, "guest debug log at failure"),
        Err(e) => error!(error = %e, "could not read guest debug log"),
    }
}
