// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Result of one gate run.

use std::fmt;

use serde::Serialize;

use crate::{IssueReport, VersionId};

/// Pass/fail decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// No net-new issues.
    Pass,
    /// Net-new issues remain after applying the allowlist.
    Fail,
}

/// Which comparison produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Current build vs. the immediately preceding version's build.
    Predecessor,
    /// Current build vs. the external last-known-good reference contract.
    Reference,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predecessor => f.write_str("predecessor"),
            Self::Reference => f.write_str("reference"),
        }
    }
}

/// A comparison that was legitimately bypassed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Skip {
    /// The version is first in its series.
    FirstInSeries,
    /// The predecessor's built artifact is not on disk.
    PredecessorMissing {
        /// Predecessor version id.
        predecessor: VersionId,
        /// Path that was probed.
        path: String,
    },
    /// The version is not the declared latest stable release.
    NotLatestStable,
    /// The reference contract directory is not on disk.
    ReferenceMissing {
        /// Path that was probed.
        path: String,
    },
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstInSeries => f.write_str("first version in the series; no predecessor comparison"),
            Self::PredecessorMissing { predecessor, path } => write!(
                f,
                "predecessor {predecessor} artifacts not found at {path}; skipping predecessor comparison"
            ),
            Self::NotLatestStable => f.write_str("not the latest stable version; no reference comparison"),
            Self::ReferenceMissing { path } => write!(
                f,
                "reference contract not found at {path}; skipping reference comparison"
            ),
        }
    }
}

/// Verdict plus net-new issues and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    /// Pass or fail.
    pub verdict: Verdict,
    /// Comparison that failed (`None` on pass).
    pub phase: Option<Phase>,
    /// Issues not covered by the allowlist (empty on pass).
    pub net_new: IssueReport,
    /// One-line summary.
    pub message: String,
    /// Comparisons bypassed during the run.
    pub skipped: Vec<Skip>,
}

impl CheckOutcome {
    /// Passing outcome.
    pub fn pass(version: &VersionId, skipped: Vec<Skip>) -> Self {
        Self {
            verdict: Verdict::Pass,
            phase: None,
            net_new: IssueReport::new(),
            message: format!("API compatibility check passed for {version}"),
            skipped,
        }
    }

    /// Failing outcome for `phase` with the given net-new issues.
    pub fn fail(version: &VersionId, phase: Phase, net_new: IssueReport, skipped: Vec<Skip>) -> Self {
        let message = format!(
            "API compatibility check failed for {version} against {phase}: {} net-new issue(s)",
            net_new.issue_count()
        );
        Self {
            verdict: Verdict::Fail,
            phase: Some(phase),
            net_new,
            message,
            skipped,
        }
    }

    /// Returns `true` on [`Verdict::Pass`].
    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}
