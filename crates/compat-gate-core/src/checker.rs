// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Two-phase compatibility gate.
//!
//! ```text
//! resolve predecessor ── unknown ──▶ UnknownVersion
//!   │
//!   ├─ predecessor built? ── run tool ─▶ parse ─▶ diff ── net-new ──▶ FAIL (stop)
//!   │
//!   ├─ version == last stable?
//!   │     reference dir present? ── run tool ─▶ parse ─▶ diff ── net-new ──▶ FAIL
//!   │     absent ──▶ warn
//!   ▼
//! PASS
//! ```
//!
//! Both phases diff against the allowlist of the version under test, so an
//! accepted issue is accepted whichever contract produced it.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::baseline::{allowlist_path, load_baseline};
use crate::diff::diff;
use crate::{
    CheckOutcome, GateError, IssueReport, Phase, Skip, ToolError, VersionId, VersionLadder,
};

/// Port for the external binary-compatibility checker.
///
/// Implementations locate and launch the tool however the platform needs;
/// the gate only consumes the raw report text.
pub trait CompatTool {
    /// Compare `implementation` against `contract` and return the raw report.
    fn run(&self, contract: &Path, implementation: &Path) -> Result<String, ToolError>;
}

impl<T: CompatTool + ?Sized> CompatTool for &T {
    fn run(&self, contract: &Path, implementation: &Path) -> Result<String, ToolError> {
        (**self).run(contract, implementation)
    }
}

/// Inputs for one gate run, supplied by the build driver.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Version being built.
    pub version: VersionId,
    /// Declared latest stable version.
    pub last_stable: VersionId,
    /// Directory of the freshly built artifacts; must contain `version` once.
    pub implementation: PathBuf,
    /// Root holding `<version>.txt` allowlists.
    pub allowlist_dir: PathBuf,
    /// Name of the reference contract directory under `allowlist_dir`.
    pub reference_dir_name: String,
}

impl CheckRequest {
    /// `<allowlist_dir>/<reference_dir_name>`.
    pub fn reference_path(&self) -> PathBuf {
        self.allowlist_dir.join(&self.reference_dir_name)
    }
}

/// Derive the predecessor's artifact path by replacing `current` with
/// `predecessor` inside `implementation`.
///
/// `current` must occur exactly once in the path.
pub fn predecessor_path(
    implementation: &Path,
    current: &VersionId,
    predecessor: &VersionId,
) -> Result<PathBuf, GateError> {
    let Some(text) = implementation.to_str() else {
        return Err(GateError::NonUtf8Path {
            path: implementation.to_path_buf(),
            version: current.to_string(),
        });
    };
    match text.matches(current.as_str()).count() {
        1 => Ok(PathBuf::from(
            text.replacen(current.as_str(), predecessor.as_str(), 1),
        )),
        occurrences => Err(GateError::VersionNotInPath {
            path: implementation.to_path_buf(),
            version: current.to_string(),
            occurrences,
        }),
    }
}

/// Orchestrates predecessor and reference comparisons for one version.
pub struct CompatChecker<'a, T> {
    ladder: &'a VersionLadder,
    tool: T,
}

impl<'a, T> CompatChecker<'a, T>
where
    T: CompatTool,
{
    /// Create a checker over `ladder` that drives `tool`.
    pub fn new(ladder: &'a VersionLadder, tool: T) -> Self {
        Self { ladder, tool }
    }

    /// Run the gate.
    ///
    /// `Ok` carries the verdict (a compatibility break is `Verdict::Fail`,
    /// not an error). `Err` is a configuration or tool failure.
    pub fn check(&self, req: &CheckRequest) -> Result<CheckOutcome, GateError> {
        let predecessor = self.ladder.resolve(&req.version)?;
        let mut accepted: Option<Option<IssueReport>> = None;
        let mut skipped = Vec::new();

        match predecessor {
            None => {
                info!(version = %req.version, "first version in the series; no predecessor comparison");
                skipped.push(Skip::FirstInSeries);
            }
            Some(pred) => {
                let contract = predecessor_path(&req.implementation, &req.version, pred)?;
                if contract.exists() {
                    let net_new = self.compare(req, &contract, &mut accepted)?;
                    if !net_new.is_empty() {
                        return Ok(CheckOutcome::fail(
                            &req.version,
                            Phase::Predecessor,
                            net_new,
                            skipped,
                        ));
                    }
                    info!(version = %req.version, predecessor = %pred, "no net-new issues against predecessor");
                } else {
                    let skip = Skip::PredecessorMissing {
                        predecessor: pred.clone(),
                        path: contract.display().to_string(),
                    };
                    info!("{skip}");
                    skipped.push(skip);
                }
            }
        }

        if req.version != req.last_stable {
            debug!(version = %req.version, last_stable = %req.last_stable, "{}", Skip::NotLatestStable);
            skipped.push(Skip::NotLatestStable);
            return Ok(CheckOutcome::pass(&req.version, skipped));
        }

        let reference = req.reference_path();
        if !reference.exists() {
            let skip = Skip::ReferenceMissing {
                path: reference.display().to_string(),
            };
            warn!("{skip}");
            skipped.push(skip);
            return Ok(CheckOutcome::pass(&req.version, skipped));
        }

        let net_new = self.compare(req, &reference, &mut accepted)?;
        if !net_new.is_empty() {
            return Ok(CheckOutcome::fail(
                &req.version,
                Phase::Reference,
                net_new,
                skipped,
            ));
        }
        info!(version = %req.version, "no net-new issues against reference contract");
        Ok(CheckOutcome::pass(&req.version, skipped))
    }

    /// Run the tool once and diff its report against the version's allowlist,
    /// loading the allowlist on first use.
    fn compare(
        &self,
        req: &CheckRequest,
        contract: &Path,
        accepted: &mut Option<Option<IssueReport>>,
    ) -> Result<IssueReport, GateError> {
        debug!(
            contract = %contract.display(),
            implementation = %req.implementation.display(),
            "running compatibility checker"
        );
        let raw = self.tool.run(contract, &req.implementation)?;
        let found = IssueReport::parse(&raw)?;

        if accepted.is_none() {
            let path = allowlist_path(&req.allowlist_dir, &req.version);
            let loaded = load_baseline(&path)?;
            if loaded.is_none() {
                debug!(path = %path.display(), "no allowlist; every issue is net-new");
            }
            *accepted = Some(loaded);
        }
        Ok(diff(&found, accepted.as_ref().and_then(Option::as_ref)))
    }
}
