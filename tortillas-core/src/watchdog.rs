// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `InterruptWatchdog`: tails the emulator's interrupt trace and blocks
//! until a caller-specified interrupt/register predicate is observed, a
//! deadline elapses, or the trace goes silent (§4.4).

use crate::constants::{WATCHDOG_IDLE_THRESHOLD, WATCHDOG_POLL_INTERVAL};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of a single `wait_until` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStatus {
    Ok,
    Timeout,
    Stopped,
}

/// A fully parsed interrupt frame: vector number plus its register dump.
#[derive(Debug, Default, Clone)]
struct Frame {
    vector: Option<u32>,
    registers: HashMap<String, u64>,
}

/// Tails `log_path` (chosen backend: a plain regular file written to by the
/// emulator's `logfile`/`log int` monitor commands, per the open question
/// in §9 — a pipe would need the same contract but isn't exercised here)
/// from the last-read offset, reassembling interrupt frames as new bytes
/// arrive.
///
/// Single-consumer: `wait_until` owns `&mut self` and advances the read
/// offset, so overlapping calls on the same watchdog cannot interleave.
pub struct InterruptWatchdog {
    log_path: Utf8PathBuf,
    offset: u64,
    carry: String,
}

impl InterruptWatchdog {
    pub fn new(log_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            offset: 0,
            carry: String::new(),
        }
    }

    pub fn log_path(&self) -> &Utf8Path {
        &self.log_path
    }

    /// Truncate/create the trace file and reset the read cursor. Called by
    /// `GuestController` before issuing the emulator's `logfile`/`log int`
    /// monitor commands.
    pub fn clean(&mut self) -> std::io::Result<()> {
        fs_err::File::create(&self.log_path)?;
        self.offset = 0;
        self.carry.clear();
        Ok(())
    }

    /// Block until a frame with vector `int_num` satisfying every
    /// `(register, value)` constraint is observed, the deadline elapses, or
    /// no new bytes arrive for [`WATCHDOG_IDLE_THRESHOLD`] consecutive
    /// polls.
    pub fn wait_until(
        &mut self,
        int_num: u32,
        reg_constraints: &HashMap<String, u64>,
        timeout: Duration,
    ) -> std::io::Result<WatchdogStatus> {
        let deadline = Instant::now() + timeout;
        let mut idle_polls = 0u32;
        let mut current: Option<Frame> = None;

        loop {
            if Instant::now() >= deadline {
                warn!(int_num, "interrupt watchdog timed out waiting");
                return Ok(WatchdogStatus::Timeout);
            }

            std::thread::sleep(WATCHDOG_POLL_INTERVAL);

            let chunk = self.read_new_text()?;
            if chunk.is_empty() {
                idle_polls += 1;
                if idle_polls > WATCHDOG_IDLE_THRESHOLD {
                    warn!("interrupt trace went silent, assuming guest stopped");
                    return Ok(WatchdogStatus::Stopped);
                }
                continue;
            }
            idle_polls = 0;

            self.carry.push_str(&chunk);
            // Keep a trailing partial line (no newline yet) for the next
            // poll; everything else is a complete line to feed the frame
            // parser below.
            let complete_end = self.carry.rfind('\n').map_or(0, |i| i + 1);
            let complete: String = self.carry.drain(..complete_end).collect();

            for line in complete.lines() {
                if let Some(vector) = parse_vector(line) {
                    current = Some(Frame {
                        vector: Some(vector),
                        registers: HashMap::new(),
                    });
                    continue;
                }

                let Some(frame) = current.as_mut() else {
                    continue;
                };
                merge_registers(line, &mut frame.registers);

                if line.contains("EFER=") {
                    let matched = frame.vector == Some(int_num)
                        && reg_constraints
                            .iter()
                            .all(|(reg, val)| frame.registers.get(reg).is_none_or(|v| v == val));
                    let finished = current.take();
                    if matched {
                        debug!(int_num, ?finished, "interrupt watchdog matched");
                        return Ok(WatchdogStatus::Ok);
                    }
                }
            }
        }
    }

    fn read_new_text(&mut self) -> std::io::Result<String> {
        let mut file = fs_err::File::open(&self.log_path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::new();
        let read = file.read_to_end(&mut buf)?;
        self.offset += read as u64;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Extract `N` from a line containing `v=<N>`.
fn parse_vector(line: &str) -> Option<u32> {
    let idx = line.find("v=")?;
    let rest = &line[idx + 2..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Split `line` on whitespace, keep `NAME=HEXVALUE` tokens with non-empty
/// halves, parse the value as hex, and merge into `registers`. Unparseable
/// tokens are silently ignored (§4.4).
fn merge_registers(line: &str, registers: &mut HashMap<String, u64>) {
    for token in line.split_whitespace() {
        let Some((name, value)) = token.split_once('=') else {
            continue;
        };
        if name.is_empty() || value.is_empty() {
            continue;
        }
        if let Ok(parsed) = u64::from_str_radix(value, 16) {
            registers.insert(name.to_string(), parsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_path(name: &str) -> Utf8PathBuf {
        let dir = std::env::temp_dir().join(format!("tortillas-watchdog-{}", std::process::id()));
        fs_err::create_dir_all(&dir).unwrap();
        Utf8PathBuf::from_path_buf(dir).unwrap().join(name)
    }

    #[test]
    fn parses_vector_and_registers() {
        assert_eq!(parse_vector("v=80 is an interrupt"), Some(80));
        assert_eq!(parse_vector("no vector here"), None);

        let mut regs = HashMap::new();
        merge_registers("RAX=0000000000010F2C RBX=1 EFER=0", &mut regs);
        assert_eq!(regs.get("RAX"), Some(&0x10F2C));
        assert_eq!(regs.get("RBX"), Some(&1));
    }

    #[test]
    fn ignores_malformed_register_tokens() {
        let mut regs = HashMap::new();
        merge_registers("=bad bad= RAX=10", &mut regs);
        assert_eq!(regs.len(), 1);
        assert_eq!(regs.get("RAX"), Some(&0x10));
    }

    #[test]
    fn s5_watchdog_match_and_timeout() {
        crate::test_support::init_tracing();
        let path = temp_path("s5_int.log");
        fs_err::write(&path, "v=80\nRAX=10F2C\nEFER=d00\n").unwrap();

        let mut watchdog = InterruptWatchdog::new(path.clone());
        let mut constraints = HashMap::new();
        constraints.insert("RAX".to_string(), 0x10F2C);
        let status = watchdog
            .wait_until(80, &constraints, Duration::from_millis(600))
            .unwrap();
        assert_eq!(status, WatchdogStatus::Ok);

        let mut watchdog = InterruptWatchdog::new(path);
        let mut constraints = HashMap::new();
        constraints.insert("RAX".to_string(), 0x2B67);
        let status = watchdog
            .wait_until(80, &constraints, Duration::from_millis(600))
            .unwrap();
        assert_eq!(status, WatchdogStatus::Timeout);
    }

    #[test]
    fn missing_register_in_frame_does_not_disqualify() {
        let path = temp_path("missing_reg.log");
        fs_err::write(&path, "v=5\nRBX=2\nEFER=0\n").unwrap();

        let mut watchdog = InterruptWatchdog::new(path);
        let mut constraints = HashMap::new();
        constraints.insert("RAX".to_string(), 0x1);
        let status = watchdog
            .wait_until(5, &constraints, Duration::from_millis(600))
            .unwrap();
        assert_eq!(status, WatchdogStatus::Ok);
    }
}
