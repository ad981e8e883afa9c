// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-version allowlist loading.
//!
//! An allowlist lives at `<allowlist_dir>/<version>.txt` and uses the same
//! text format as the checker report. A missing file is not an error; a
//! malformed one is.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{GateError, IssueReport, VersionId};

/// Path of the allowlist for `version` under `root`.
pub fn allowlist_path(root: &Path, version: &VersionId) -> PathBuf {
    root.join(format!("{version}.txt"))
}

/// Load and parse the allowlist at `path`. Returns `Ok(None)` if it does not exist.
pub fn load_baseline(path: &Path) -> Result<Option<IssueReport>, GateError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(GateError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    IssueReport::parse(&raw)
        .map(Some)
        .map_err(|e| GateError::MalformedAllowlist {
            path: path.to_path_buf(),
            source: Box::new(e),
        })
}
