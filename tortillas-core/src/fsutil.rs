// Copyright (c) The tortillas Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Small filesystem helpers shared by the snapshotter and the scheduler.

use crate::errors::TortillasError;
use camino::Utf8Path;

/// Remove `dir` if present and recreate it empty.
pub fn reset_dir(dir: &Utf8Path) -> Result<(), TortillasError> {
    if dir.is_dir() {
        fs_err::remove_dir_all(dir).map_err(|source| TortillasError::Io {
            context: format!("clearing {dir}"),
            source,
        })?;
    }
    fs_err::create_dir_all(dir).map_err(|source| TortillasError::Io {
        context: format!("creating {dir}"),
        source,
    })
}
