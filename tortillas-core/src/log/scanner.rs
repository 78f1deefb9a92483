// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splits cleaned guest debug output into scope blocks.

use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([A-Z]+ *)\]|KERNEL PANIC: ").expect("static tag regex"));

/// The synthetic scope tag used for the `KERNEL PANIC: ` marker, since it
/// carries no bracketed name of its own.
pub const PANIC_SCOPE: &str = "KERNEL PANIC";

/// A lazy, single-pass, non-restartable iterator over `(scope_tag, body)`
/// pairs in ANSI-cleaned debug output.
///
/// A tag is either a bracketed upper-case label (e.g. `[SYSCALL ]`, trimmed
/// to `SYSCALL`) or the literal `KERNEL PANIC: ` marker (tagged
/// [`PANIC_SCOPE`]). A block's body runs from the end of its tag to the
/// start of the next tag, or to the end of input.
pub struct LineScanner<'a> {
    text: &'a str,
    matches: std::iter::Peekable<regex::Matches<'static, 'a>>,
}

impl<'a> LineScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            matches: TAG_RE.find_iter(text).peekable(),
        }
    }
}

impl<'a> Iterator for LineScanner<'a> {
    type Item = (String, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let tag_match = self.matches.next()?;
        let body_start = tag_match.end();
        let body_end = self
            .matches
            .peek()
            .map(|next| next.start())
            .unwrap_or(self.text.len());

        let tag = if tag_match.as_str().starts_with('[') {
            tag_match
                .as_str()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .trim()
                .to_string()
        } else {
            PANIC_SCOPE.to_string()
        };

        Some((tag, &self.text[body_start..body_end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_consecutive_tagged_blocks() {
        let text = "[SYSCALL ]Syscall::EXIT: called, exit_code: 1237619379\n\
                    [THREAD  ]kill: tid=3\n";
        let blocks: Vec<_> = LineScanner::new(text).collect();
        assert_eq!(
            blocks,
            vec![
                (
                    "SYSCALL".to_string(),
                    "Syscall::EXIT: called, exit_code: 1237619379\n"
                ),
                ("THREAD".to_string(), "kill: tid=3\n"),
            ]
        );
    }

    #[test]
    fn recognizes_panic_marker() {
        let text = "KERNEL PANIC: bad opcode\n";
        let blocks: Vec<_> = LineScanner::new(text).collect();
        assert_eq!(blocks, vec![("KERNEL PANIC".to_string(), "bad opcode\n")]);
    }

    #[test]
    fn ignores_non_tag_brackets_inside_a_body() {
        let text = "[SYSCALL ]array index [not a tag] was 4\n[THREAD  ]done\n";
        let blocks: Vec<_> = LineScanner::new(text).collect();
        assert_eq!(
            blocks,
            vec![
                (
                    "SYSCALL".to_string(),
                    "array index [not a tag] was 4\n"
                ),
                ("THREAD".to_string(), "done\n"),
            ]
        );
    }

    #[test]
    fn leading_text_before_first_tag_is_dropped() {
        let text = "boot noise\n[SYSCALL ]hello\n";
        let blocks: Vec<_> = LineScanner::new(text).collect();
        assert_eq!(blocks, vec![("SYSCALL".to_string(), "hello\n")]);
    }

    #[test]
    fn a_space_inside_an_all_caps_bracket_is_not_a_tag() {
        // Only a contiguous upper-case run followed by trailing spaces is a
        // tag; `[NOT RUNNING]` has a space before its last word, so the
        // whole line stays inside the preceding block's body.
        let text = "[SYSCALL ]state is [NOT RUNNING] now\n";
        let blocks: Vec<_> = LineScanner::new(text).collect();
        assert_eq!(
            blocks,
            vec![("SYSCALL".to_string(), "state is [NOT RUNNING] now\n")]
        );
    }
}
