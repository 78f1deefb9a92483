// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ParseRule` / `AnalyzeRule`: the two views split out of each on-disk
//! `analyze:` entry (§3, §6).

use crate::status::TestStatus;
use regex::Regex;

/// Either "match any scope" or a specific upper-case scope tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Tag(String),
}

impl Scope {
    pub fn matches(&self, tag: &str) -> bool {
        match self {
            Scope::All => true,
            Scope::Tag(expected) => expected == tag,
        }
    }

    fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("all") {
            Scope::All
        } else {
            Scope::Tag(raw.to_string())
        }
    }
}

/// A scope + compiled single-capture regex, applied to scope blocks by the
/// `LogParser`. Compiled once at config load time; never mutated after.
#[derive(Debug, Clone)]
pub struct ParseRule {
    pub name: String,
    pub scope: Scope,
    pub pattern: Regex,
}

/// The polymorphic analyzer dispatch (§9 design note: a closed sum instead
/// of the source's stringly-typed `mode` branch).
#[derive(Debug, Clone)]
pub enum AnalyzeMode {
    AddAsError,
    AddAsErrorJoin,
    AddAsErrorLast,
    ExpectStdout,
    ExitCodes,
}

/// The analysis half of a combined `analyze:` entry. `name` always refers to
/// a live [`ParseRule`] with the same name (enforced at config load time).
#[derive(Debug, Clone)]
pub struct AnalyzeRule {
    pub name: String,
    pub mode: AnalyzeMode,
    pub set_status: Option<TestStatus>,
}

impl ParseRule {
    pub(crate) fn compile(
        name: String,
        raw_scope: &str,
        raw_pattern: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            scope: Scope::parse(raw_scope),
            pattern: Regex::new(raw_pattern)?,
        })
    }
}
