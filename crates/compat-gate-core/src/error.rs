// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for the compatibility gate.
//!
//! Everything here is a configuration or infrastructure failure. A
//! compatibility break is not an error: it is a [`Verdict::Fail`] outcome.
//!
//! [`Verdict::Fail`]: crate::Verdict::Fail

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Fatal errors raised while resolving, parsing, or running a check.
#[derive(Debug, Error)]
pub enum GateError {
    /// The version under test has no entry in the version ladder.
    #[error(
        "[UNKNOWN_VERSION] version `{version}` is not in the version ladder; \
         add it to the built-in table in compat_gate_core::ladder or to the `ladder` list of the config file"
    )]
    UnknownVersion {
        /// Version id that was looked up.
        version: String,
    },
    /// A report or allowlist did not start with an assembly header line.
    #[error(
        "[MALFORMED_REPORT] report must begin with an assembly header line \
         (line {line}: `{text}`)"
    )]
    MalformedReport {
        /// 1-based line number of the offending line.
        line: usize,
        /// The offending line, trimmed.
        text: String,
    },
    /// An allowlist file could not be parsed.
    #[error("[MALFORMED_ALLOWLIST] {path}: {source}")]
    MalformedAllowlist {
        /// Allowlist file that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: Box<GateError>,
    },
    /// The implementation path does not contain the current version exactly once.
    #[error(
        "[VERSION_NOT_IN_PATH] `{path}` must contain version `{version}` exactly once \
         (found {occurrences}) to derive the predecessor artifact path"
    )]
    VersionNotInPath {
        /// Implementation path that was searched.
        path: PathBuf,
        /// Version id that was searched for.
        version: String,
        /// Number of occurrences found.
        occurrences: usize,
    },
    /// The implementation path is not UTF-8, so no version can be substituted in it.
    #[error(
        "[NON_UTF8_PATH] `{path}` is not valid UTF-8; cannot substitute version `{version}` \
         to derive the predecessor artifact path"
    )]
    NonUtf8Path {
        /// Implementation path that was searched.
        path: PathBuf,
        /// Version id that was searched for.
        version: String,
    },
    /// Filesystem error while reading an input.
    #[error("[IO] {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The external checker could not be run to completion.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl GateError {
    /// Returns `true` for errors that mean the gate itself is misconfigured.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownVersion { .. }
                | Self::MalformedReport { .. }
                | Self::MalformedAllowlist { .. }
                | Self::VersionNotInPath { .. }
                | Self::NonUtf8Path { .. }
        )
    }
}

/// Failures of the external checker invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The checker process could not be started.
    #[error("[TOOL_LAUNCH] failed to launch `{program}`: {source}")]
    Launch {
        /// Program that was spawned.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },
    /// The checker did not finish within the configured bound.
    #[error("[TOOL_TIMEOUT] `{program}` did not finish within {timeout:?} and was killed")]
    Timeout {
        /// Program that timed out.
        program: String,
        /// Configured bound.
        timeout: Duration,
    },
    /// The checker could not be reaped after being killed.
    #[error("[TOOL_REAP_TIMEOUT] `{program}` could not be reaped after kill")]
    ReapTimeout {
        /// Program that could not be reaped.
        program: String,
    },
    /// The checker exited unsuccessfully without producing a report.
    #[error("[TOOL_FAILED] `{program}` exited with {status} and no report: {stderr}")]
    Failed {
        /// Program that failed.
        program: String,
        /// Rendered exit status.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },
    /// The checker wrote more to stdout than the capture limit allows.
    #[error(
        "[TOOL_OUTPUT_TOO_LARGE] `{program}` wrote more than {limit} bytes to stdout; \
         a truncated report cannot be trusted"
    )]
    OutputTooLarge {
        /// Program whose output overflowed.
        program: String,
        /// Capture limit in bytes.
        limit: u64,
    },
    /// Reading checker output failed.
    #[error("[TOOL_IO] {context}: {source}")]
    Io {
        /// What was being done.
        context: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_second_timeout_renders_precisely() {
        let err = ToolError::Timeout {
            program: "apicompat".into(),
            timeout: Duration::from_millis(300),
        };
        assert!(err.to_string().contains("within 300ms"));
    }

    #[test]
    fn non_utf8_path_is_a_configuration_error() {
        let err = GateError::NonUtf8Path {
            path: PathBuf::from("out"),
            version: "1.0.0".into(),
        };
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("[NON_UTF8_PATH]"));
    }
}
