// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `GuestController`: scoped ownership of one emulator process (§4.5).
//!
//! Acquire with [`GuestController::open`]; release explicitly with
//! [`GuestController::close`] (the primary, error-propagating teardown
//! path) or let [`Drop`] perform the same steps best-effort as a safety net
//! for paths that return early via `?` or panic before `close` runs.

use crate::constants::{MONITOR_SETTLE, SENDKEY_HOLD_MS};
use crate::errors::TortillasError;
use crate::watchdog::InterruptWatchdog;
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;
use std::process::{Child, Command, Stdio};
use tracing::{debug, error, warn};

/// Target CPU architecture a test image was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    X86_32,
}

impl Arch {
    /// The architectural register the guest places its magic return value
    /// in (§4.6).
    pub fn return_register(self) -> &'static str {
        match self {
            Arch::X86_64 => "RAX",
            Arch::X86_32 => "EAX",
        }
    }

    fn qemu_binary(self) -> &'static str {
        match self {
            Arch::X86_64 => "qemu-system-x86_64",
            Arch::X86_32 => "qemu-system-i386",
        }
    }

    fn cpu_model(self) -> &'static str {
        match self {
            Arch::X86_64 => "qemu64",
            Arch::X86_32 => "qemu32",
        }
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" => Ok(Arch::X86_64),
            "x86_32" => Ok(Arch::X86_32),
            other => Err(format!("unsupported architecture `{other}`")),
        }
    }
}

/// Parameters for acquiring one [`GuestController`].
pub struct GuestOptions<'a> {
    pub run_dir: &'a Utf8Path,
    pub disk_image: &'a Utf8Path,
    pub arch: Arch,
    pub vm_state_label: Option<&'a str>,
    pub watchdog_enabled: bool,
    /// Replaces the `qemu-system-*` invocation with an arbitrary `argv`,
    /// bypassing [`build_qemu_command`] entirely. Production callers leave
    /// this `None`; it exists so tests can exercise pipe setup/teardown and
    /// spawn-failure handling against a stub process instead of a real
    /// emulator binary.
    pub spawn_override: Option<&'a [&'a str]>,
}

/// One emulator process, its monitor pipes, and (optionally) its
/// [`InterruptWatchdog`].
pub struct GuestController {
    run_dir: Utf8PathBuf,
    fifo_base: Utf8PathBuf,
    process: Child,
    monitor_in: Option<std::fs::File>,
    watchdog: Option<InterruptWatchdog>,
    closed: bool,
}

impl GuestController {
    /// Create the run directory and monitor pipes, spawn the emulator, open
    /// the monitor-input pipe, and (if requested) start the watchdog.
    pub fn open(opts: GuestOptions<'_>) -> Result<Self, TortillasError> {
        let setup_err = |context: &str, source: std::io::Error| TortillasError::Setup {
            context: context.to_string(),
            source,
        };

        fs_err::create_dir_all(opts.run_dir)
            .map_err(|e| setup_err("creating run directory", e))?;

        let fifo_base = opts.run_dir.join("qemu");
        let fifo_in = format!("{fifo_base}.in");
        let fifo_out = format!("{fifo_base}.out");
        for path in [&fifo_in, &fifo_out] {
            make_fifo(path).map_err(|e| setup_err("creating monitor pipe", e))?;
        }

        let process = match opts.spawn_override {
            Some(argv) => {
                let (bin, args) = argv
                    .split_first()
                    .expect("spawn_override must name at least a binary");
                debug!(?argv, "spawning stubbed emulator");
                Command::new(bin)
                    .args(args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map_err(|e| setup_err("spawning emulator process", e))?
            }
            None => {
                let out_log = opts.run_dir.join("out.log");
                let cmd = build_qemu_command(&opts, &out_log, &fifo_base);
                debug!(?cmd, "spawning emulator");
                Command::new(opts.arch.qemu_binary())
                    .args(cmd)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map_err(|e| setup_err("spawning emulator process", e))?
            }
        };

        let monitor_in = std::fs::OpenOptions::new()
            .write(true)
            .open(&fifo_in)
            .map_err(|e| setup_err("opening monitor-input pipe", e))?;

        let mut controller = Self {
            run_dir: opts.run_dir.to_owned(),
            fifo_base,
            process,
            monitor_in: Some(monitor_in),
            watchdog: None,
            closed: false,
        };

        if opts.watchdog_enabled {
            let mut watchdog = InterruptWatchdog::new(opts.run_dir.join("int.log"));
            watchdog
                .clean()
                .map_err(|e| setup_err("priming interrupt log", e))?;
            controller.monitor_command(&format!("logfile {}", watchdog.log_path()))?;
            controller.monitor_command("log int")?;
            controller.watchdog = Some(watchdog);
        }

        Ok(controller)
    }

    pub fn run_dir(&self) -> &Utf8Path {
        &self.run_dir
    }

    pub fn watchdog_mut(&mut self) -> Option<&mut InterruptWatchdog> {
        self.watchdog.as_mut()
    }

    /// Report whether the child process has not yet exited.
    pub fn is_alive(&mut self) -> bool {
        match self.process.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(e) => {
                error!(error = %e, "failed to poll emulator process status");
                false
            }
        }
    }

    /// Write `cmd` followed by a newline to the monitor pipe, flush, then
    /// settle briefly (§4.5: documented QEMU race on back-to-back writes).
    pub fn monitor_command(&mut self, cmd: &str) -> Result<(), TortillasError> {
        let Some(input) = self.monitor_in.as_mut() else {
            return Ok(());
        };
        let line = format!("{cmd}\n");
        let bytes = line.as_bytes();
        let written = input.write(bytes).map_err(|e| TortillasError::Setup {
            context: "writing monitor command".to_string(),
            source: e,
        })?;
        input.flush().map_err(|e| TortillasError::Setup {
            context: "flushing monitor command".to_string(),
            source: e,
        })?;
        if written != bytes.len() {
            warn!(
                intended = bytes.len(),
                actual = written,
                "monitor pipe short write"
            );
        }
        std::thread::sleep(MONITOR_SETTLE);
        Ok(())
    }

    /// Type `text` into the guest via a sequence of `sendkey` monitor
    /// commands (§4.5 keymap).
    pub fn type_input(&mut self, text: &str) -> Result<(), TortillasError> {
        for ch in text.chars() {
            self.monitor_command(&sendkey_command(ch))?;
        }
        Ok(())
    }

    /// Primary, error-propagating release path (§4.5 exit steps 1-4).
    pub fn close(mut self) -> Result<(), TortillasError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), TortillasError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Every step below runs regardless of earlier failures (§4.5: the
        // emulator must be quit and the pipes removed on every exit path);
        // the first error encountered is what gets returned.
        let mut first_error: Option<TortillasError> = None;

        if let Some(watchdog) = self.watchdog.take() {
            let _ = self.monitor_command("log none");
            if let Err(e) = fs_err::remove_file(watchdog.log_path()) {
                warn!(error = %e, "failed to remove interrupt log");
            }
        }

        if self.is_alive()
            && let Err(e) = self.monitor_command("quit")
        {
            first_error.get_or_insert(e);
        }

        self.monitor_in.take();

        match self.process.wait() {
            Ok(status) => debug!(?status, "emulator process exited"),
            Err(e) => {
                first_error.get_or_insert(TortillasError::Setup {
                    context: "waiting for emulator to exit".to_string(),
                    source: e,
                });
            }
        }

        for path in [
            format!("{}.in", self.fifo_base),
            format!("{}.out", self.fifo_base),
        ] {
            if let Err(e) = fs_err::remove_file(&path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!(error = %e, path, "failed to remove monitor pipe");
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for GuestController {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.teardown() {
            error!(error = %e, "error tearing down guest controller in Drop");
        }
    }
}

fn sendkey_command(ch: char) -> String {
    let key = match ch {
        '\n' => "kp_enter".to_string(),
        ' ' => "spc".to_string(),
        '.' => "dot".to_string(),
        '_' => "shift-minus".to_string(),
        '-' => "minus".to_string(),
        '/' => "slash".to_string(),
        c if c.is_ascii_uppercase() => format!("shift-{}", c.to_ascii_lowercase()),
        c => c.to_string(),
    };
    format!("sendkey {key} {SENDKEY_HOLD_MS}")
}

fn build_qemu_command(opts: &GuestOptions<'_>, out_log: &Utf8Path, fifo_base: &Utf8Path) -> Vec<String> {
    let mut args = vec![
        "-m".to_string(),
        "8M".to_string(),
        "-cpu".to_string(),
        opts.arch.cpu_model().to_string(),
        "-drive".to_string(),
        format!("file={},index=0,media=disk", opts.disk_image),
        "-debugcon".to_string(),
        format!("file:{out_log}"),
        "-monitor".to_string(),
        format!("pipe:{fifo_base}"),
        "-nographic".to_string(),
        "-display".to_string(),
        "none".to_string(),
        "-serial".to_string(),
        "/dev/null".to_string(),
    ];
    if let Some(label) = opts.vm_state_label {
        args.push("-loadvm".to_string());
        args.push(label.to_string());
    }
    args
}

#[cfg(unix)]
fn make_fifo(path: &str) -> std::io::Result<()> {
    use nix::sys::stat::Mode;
    nix::unistd::mkfifo(path, Mode::from_bits_truncate(0o666)).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn make_fifo(_path: &str) -> std::io::Result<()> {
    Err(std::io::Error::other(
        "named pipes are only supported on unix",
    ))
}
