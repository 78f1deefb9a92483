// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the orchestration engine.
//!
//! Every fallible operation in the core returns [`Result<T, TortillasError>`].
//! Configuration and setup errors are meant to propagate with `?` all the way
//! to the CLI glue; guest-observed and liveness outcomes never become
//! `Err`s, they are folded into [`crate::test_run::TestResult`] instead.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Top-level error type for everything THE CORE can fail at.
#[derive(Debug, Error)]
pub enum TortillasError {
    /// The top-level YAML config or a per-test YAML header failed to parse,
    /// was missing a required key, carried an unknown key, or embedded a
    /// regex that does not compile.
    #[error("failed to load config at `{path}`")]
    Config {
        path: Utf8PathBuf,
        #[source]
        source: ConfigErrorKind,
    },

    /// Could not create the run directory, the named pipes, the disk
    /// overlay, or spawn the emulator process for a single run.
    #[error("failed to set up guest for `{context}`")]
    Setup {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The golden snapshot could not be produced; this is fatal for the
    /// whole process, not just one run.
    #[error("failed to create golden snapshot: {reason}")]
    Snapshot { reason: String },

    /// Propagated I/O failure with no more specific bucket (reading a trace
    /// file, copying an overlay, etc).
    #[error("I/O error at `{context}`")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// The specific reason a configuration document failed to load.
#[derive(Debug, Error)]
pub enum ConfigErrorKind {
    #[error("missing required key `{0}`")]
    MissingKey(String),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid pattern in parse rule `{name}`: {source}")]
    Regex {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("duplicate analyze rule name `{0}`")]
    DuplicateAnalyzeName(String),
}

pub type Result<T> = std::result::Result<T, TortillasError>;
