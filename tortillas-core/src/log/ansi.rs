// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strips 7-bit C1 ANSI escape sequences from raw guest debug output.

use regex::bytes::Regex;
use std::sync::LazyLock;

// Mirrors the upstream regex (https://stackoverflow.com/a/14693789): ESC
// followed either by a single "Fe" byte, or by `[` (CSI) and a parameter /
// intermediate / final byte sequence. Does not match 8-bit C1 codes.
static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?x) \x1B (?: [@-Z\\-_] | \[ [0-?]* [ -/]* [@-~] )").expect("static ANSI regex")
});

/// Remove ANSI escape sequences from `input`, returning a clean byte buffer.
///
/// Idempotent: `strip(&strip(x)) == strip(x)` for all `x`.
pub fn strip(input: &[u8]) -> Vec<u8> {
    ANSI_RE.replace_all(input, &b""[..]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_csi_color_codes() {
        let input = b"\x1b[31mred\x1b[0m plain";
        assert_eq!(strip(input), b"red plain");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        let input = b"[SYSCALL ]no escapes here\n";
        assert_eq!(strip(input), input);
    }

    #[test]
    fn idempotent_on_arbitrary_bytes() {
        let input = b"\x1b[1;37mKERNEL PANIC: \x1b[0mbad opcode\x1b[2K\n";
        let once = strip(input);
        let twice = strip(&once);
        assert_eq!(once, twice);
    }

    proptest::proptest! {
        #[test]
        fn idempotent_proptest(bytes: Vec<u8>) {
            let once = strip(&bytes);
            let twice = strip(&once);
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
