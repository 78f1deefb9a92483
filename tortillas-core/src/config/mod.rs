// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loading and validating the top-level YAML config (§6).
//!
//! Each `analyze:` entry on disk combines parse-and-analyze responsibilities
//! (`name`/`scope`/`pattern` drive parsing, `mode`/`set_status` drive
//! analysis); at load time it is split into a [`ParseRule`] and an
//! [`AnalyzeRule`] that share `name`, keeping the 1:1 invariant by
//! construction rather than by cross-checking two independently loaded
//! lists.

pub mod test_spec;

use crate::errors::{ConfigErrorKind, TortillasError};
use crate::rules::{AnalyzeMode, AnalyzeRule, ParseRule};
use crate::status::TestStatus;
use camino::Utf8Path;
use serde::Deserialize;

/// One raw `analyze:` sequence entry, as written in the YAML config.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAnalyzeEntry {
    name: String,
    #[serde(default = "default_scope")]
    scope: String,
    #[serde(default = "default_pattern")]
    pattern: String,
    mode: RawMode,
    set_status: Option<TestStatus>,
}

fn default_scope() -> String {
    "ALL".to_string()
}

fn default_pattern() -> String {
    "(.*)".to_string()
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawMode {
    AddAsError,
    AddAsErrorJoin,
    AddAsErrorLast,
    ExpectStdout,
    ExitCodes,
}

impl From<RawMode> for AnalyzeMode {
    fn from(raw: RawMode) -> Self {
        match raw {
            RawMode::AddAsError => AnalyzeMode::AddAsError,
            RawMode::AddAsErrorJoin => AnalyzeMode::AddAsErrorJoin,
            RawMode::AddAsErrorLast => AnalyzeMode::AddAsErrorLast,
            RawMode::ExpectStdout => AnalyzeMode::ExpectStdout,
            RawMode::ExitCodes => AnalyzeMode::ExitCodes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    threads: usize,
    bootup_timeout_secs: u64,
    default_test_timeout_secs: u64,
    sc_tortillas_bootup: u64,
    sc_tortillas_finished: u64,
    analyze: Vec<RawAnalyzeEntry>,
}

/// The loaded, validated, immutable top-level configuration. Shared behind
/// an `Arc` for the process lifetime once loaded.
#[derive(Debug)]
pub struct TortillasConfig {
    pub threads: usize,
    pub bootup_timeout_secs: u64,
    pub default_test_timeout_secs: u64,
    pub sc_tortillas_bootup: u64,
    pub sc_tortillas_finished: u64,
    pub parse_rules: Vec<ParseRule>,
    pub analyze_rules: Vec<AnalyzeRule>,
}

impl TortillasConfig {
    pub fn load(path: &Utf8Path) -> Result<Self, TortillasError> {
        let to_err = |source: ConfigErrorKind| TortillasError::Config {
            path: path.to_owned(),
            source,
        };

        let raw_text = fs_err::read_to_string(path)
            .map_err(|source| to_err(ConfigErrorKind::Io(source)))?;
        let raw: RawConfig =
            serde_yaml::from_str(&raw_text).map_err(|source| to_err(ConfigErrorKind::Yaml(source)))?;

        if raw.threads == 0 {
            return Err(to_err(ConfigErrorKind::MissingKey(
                "threads (must be positive)".to_string(),
            )));
        }

        let mut parse_rules = Vec::with_capacity(raw.analyze.len());
        let mut analyze_rules = Vec::with_capacity(raw.analyze.len());
        let mut seen_names = std::collections::HashSet::with_capacity(raw.analyze.len());

        for entry in raw.analyze {
            if !seen_names.insert(entry.name.clone()) {
                return Err(to_err(ConfigErrorKind::DuplicateAnalyzeName(entry.name)));
            }

            let parse_rule =
                ParseRule::compile(entry.name.clone(), &entry.scope, &entry.pattern).map_err(
                    |source| {
                        to_err(ConfigErrorKind::Regex {
                            name: entry.name.clone(),
                            source,
                        })
                    },
                )?;
            analyze_rules.push(AnalyzeRule {
                name: entry.name.clone(),
                mode: entry.mode.into(),
                set_status: entry.set_status,
            });
            parse_rules.push(parse_rule);
        }

        Ok(Self {
            threads: raw.threads,
            bootup_timeout_secs: raw.bootup_timeout_secs,
            default_test_timeout_secs: raw.default_test_timeout_secs,
            sc_tortillas_bootup: raw.sc_tortillas_bootup,
            sc_tortillas_finished: raw.sc_tortillas_finished,
            parse_rules,
            analyze_rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
threads: 4
bootup_timeout_secs: 10
default_test_timeout_secs: 30
sc_tortillas_bootup: 0x1
sc_tortillas_finished: 0x2
analyze:
  - name: panic
    scope: KERNEL PANIC
    pattern: "(.*)"
    mode: add_as_error
    set_status: PANIC
  - name: exit_code
    scope: SYSCALL
    pattern: "exit_code: (\\d+)"
    mode: exit_codes
    set_status: FAILED
"#;

    #[test]
    fn loads_and_splits_combined_entries() {
        let dir = tempdir();
        let path = dir.join("tortillas_config.yml");
        fs_err::write(&path, SAMPLE).unwrap();

        let config = TortillasConfig::load(&path).unwrap();
        assert_eq!(config.threads, 4);
        assert_eq!(config.parse_rules.len(), 2);
        assert_eq!(config.analyze_rules.len(), 2);
        assert_eq!(config.parse_rules[0].name, "panic");
        assert_eq!(config.analyze_rules[0].name, "panic");
    }

    #[test]
    fn rejects_unknown_keys() {
        let dir = tempdir();
        let path = dir.join("tortillas_config.yml");
        fs_err::write(&path, format!("{SAMPLE}\nbogus_key: 1\n")).unwrap();

        let err = TortillasConfig::load(&path).unwrap_err();
        assert!(matches!(err, TortillasError::Config { .. }));
    }

    #[test]
    fn rejects_invalid_regex() {
        let dir = tempdir();
        let path = dir.join("tortillas_config.yml");
        let bad = SAMPLE.replace("exit_code: (\\d+)", "exit_code: (");
        fs_err::write(&path, bad).unwrap();

        let err = TortillasConfig::load(&path).unwrap_err();
        assert!(matches!(err, TortillasError::Config { .. }));
    }

    #[test]
    fn rejects_duplicate_analyze_names() {
        let dir = tempdir();
        let path = dir.join("tortillas_config.yml");
        let duplicated = format!(
            "{SAMPLE}  - name: panic\n    scope: ALL\n    pattern: \"(.*)\"\n    mode: add_as_error\n"
        );
        fs_err::write(&path, duplicated).unwrap();

        let err = TortillasConfig::load(&path).unwrap_err();
        match err {
            TortillasError::Config {
                source: ConfigErrorKind::DuplicateAnalyzeName(name),
                ..
            } => assert_eq!(name, "panic"),
            other => panic!("expected DuplicateAnalyzeName, got {other:?}"),
        }
    }

    fn tempdir() -> camino::Utf8PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "tortillas-config-test-{}-{}",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        ));
        fs_err::create_dir_all(&dir).unwrap();
        camino::Utf8PathBuf::from_path_buf(dir).unwrap()
    }

    static TEMP_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
}
