// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test-only helpers shared across `#[cfg(test)]` modules.

#![cfg(test)]

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a `tracing-subscriber` fmt layer once per test binary. Safe to
/// call from every test; later calls are no-ops, so parallel test threads
/// never race to install a second global subscriber.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}
