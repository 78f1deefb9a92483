// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `LogParser`: turns a guest debug trace into [`LogData`] under an ordered
//! set of [`ParseRule`]s.

use super::ansi;
use super::scanner::LineScanner;
use crate::errors::{Result, TortillasError};
use crate::rules::ParseRule;
use camino::Utf8Path;
use indexmap::IndexMap;

/// `rule-name -> ordered captures`, total over the configured rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogData(IndexMap<String, Vec<String>>);

impl LogData {
    fn with_keys(rules: &[ParseRule]) -> Self {
        Self(rules.iter().map(|r| (r.name.clone(), Vec::new())).collect())
    }

    pub fn get(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Parse the scope blocks of `body` (already ANSI-stripped) against `rules`,
/// appending at most one capture per rule per block in encounter order.
pub fn parse_str(body: &str, rules: &[ParseRule]) -> LogData {
    let mut data = LogData::with_keys(rules);

    for (tag, message) in LineScanner::new(body) {
        for rule in rules {
            if !rule.scope.matches(&tag) {
                continue;
            }
            if let Some(captures) = rule.pattern.captures(message)
                && let Some(group) = captures.get(1)
            {
                data.0
                    .get_mut(&rule.name)
                    .expect("LogData keys seeded from the same rule set")
                    .push(group.as_str().to_string());
            }
        }
    }

    data
}

/// Read `path`, strip ANSI escapes, and parse it against `rules`.
pub fn parse(path: &Utf8Path, rules: &[ParseRule]) -> Result<LogData> {
    let raw = fs_err::read(path).map_err(|source| TortillasError::Io {
        context: path.to_string(),
        source,
    })?;
    let cleaned = ansi::strip(&raw);
    let text = String::from_utf8_lossy(&cleaned);
    Ok(parse_str(&text, rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rule(name: &str, scope: &str, pattern: &str) -> ParseRule {
        ParseRule::compile(name.to_string(), scope, pattern).unwrap()
    }

    #[test]
    fn totality_over_empty_input() {
        let rules = vec![rule("a", "ALL", "(.*)"), rule("b", "SYSCALL", "(.*)")];
        let data = parse_str("", &rules);
        assert_eq!(data.get("a"), &[] as &[String]);
        assert_eq!(data.get("b"), &[] as &[String]);
    }

    #[test]
    fn s4_parser_split() {
        let text = "[SYSCALL ]Syscall::EXIT: called, exit_code: 1237619379\n\
                    [THREAD  ]kill: tid=3\n";
        let rules = vec![
            rule("exit_code", "SYSCALL", r"exit_code: (\d+)"),
            rule("kill", "THREAD", r"(kill: (.*))"),
        ];
        let data = parse_str(text, &rules);
        assert_eq!(data.get("exit_code"), &["1237619379".to_string()]);
        assert_eq!(data.get("kill"), &["kill: tid=3\n".to_string()]);
    }

    #[test]
    fn scope_isolation() {
        let text = "[SYSCALL ]exit_code: 1\n[THREAD  ]exit_code: 2\n";
        let rules = vec![rule("ec", "SYSCALL", r"exit_code: (\d+)")];
        let data = parse_str(text, &rules);
        assert_eq!(data.get("ec"), &["1".to_string()]);
    }

    #[test]
    fn all_scope_matches_every_block() {
        let text = "[SYSCALL ]foo 1\n[THREAD  ]foo 2\n";
        let rules = vec![rule("foo", "ALL", r"foo (\d)")];
        let data = parse_str(text, &rules);
        assert_eq!(data.get("foo"), &["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn panic_marker_scope_is_kernel_panic() {
        let text = "KERNEL PANIC: bad opcode\n";
        let rules = vec![rule("panic", "KERNEL PANIC", "(.*)")];
        let data = parse_str(text, &rules);
        assert_eq!(data.get("panic"), &["bad opcode\n".to_string()]);
    }
}
