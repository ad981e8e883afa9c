// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end gate runs against a scripted checker and on-disk fixtures.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use compat_gate_core::{
    CheckRequest, CompatChecker, CompatTool, GateError, Phase, Skip, ToolError, Verdict,
    VersionLadder,
};
use tempfile::TempDir;

const FOO_REPORT: &str = "Compat issues with assembly Foo.dll\nRemoved method Bar\nTotal Issues: 1\n";

/// Returns canned reports keyed by contract path and records every call.
struct ScriptedTool {
    reports: Vec<(PathBuf, String)>,
    calls: RefCell<Vec<(PathBuf, PathBuf)>>,
}

impl ScriptedTool {
    fn new() -> Self {
        Self {
            reports: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn with(mut self, contract: &Path, report: &str) -> Self {
        self.reports.push((contract.to_path_buf(), report.to_owned()));
        self
    }

    fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.calls.borrow().clone()
    }
}

impl CompatTool for ScriptedTool {
    fn run(&self, contract: &Path, implementation: &Path) -> Result<String, ToolError> {
        self.calls
            .borrow_mut()
            .push((contract.to_path_buf(), implementation.to_path_buf()));
        Ok(self
            .reports
            .iter()
            .find(|(c, _)| c == contract)
            .map(|(_, r)| r.clone())
            .unwrap_or_default())
    }
}

struct FailingTool;

impl CompatTool for FailingTool {
    fn run(&self, _: &Path, _: &Path) -> Result<String, ToolError> {
        Err(ToolError::Failed {
            program: "apicompat".into(),
            status: "exit status: 2".into(),
            stderr: "boom".into(),
        })
    }
}

struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    ladder: VersionLadder,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        fs::create_dir_all(root.join("allow")).unwrap();
        Self {
            _tmp: tmp,
            root,
            ladder: VersionLadder::from_sequence(["1.0.0", "1.1.0", "2.0.0"]).unwrap(),
        }
    }

    fn build(&self, version: &str) -> PathBuf {
        let dir = self.artifact(version);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn artifact(&self, version: &str) -> PathBuf {
        self.root.join("out").join(version).join("lib")
    }

    fn reference(&self) -> PathBuf {
        let dir = self.root.join("allow").join("reference");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn allow(&self, version: &str, text: &str) {
        fs::write(self.root.join("allow").join(format!("{version}.txt")), text).unwrap();
    }

    fn request(&self, version: &str, last_stable: &str) -> CheckRequest {
        CheckRequest {
            version: version.into(),
            last_stable: last_stable.into(),
            implementation: self.artifact(version),
            allowlist_dir: self.root.join("allow"),
            reference_dir_name: "reference".into(),
        }
    }
}

#[test]
fn net_new_issue_without_allowlist_fails() {
    let fx = Fixture::new();
    let pred = fx.build("1.0.0");
    fx.build("1.1.0");
    let tool = ScriptedTool::new().with(&pred, FOO_REPORT);

    let outcome = CompatChecker::new(&fx.ladder, &tool)
        .check(&fx.request("1.1.0", "2.0.0"))
        .unwrap();

    assert_eq!(outcome.verdict, Verdict::Fail);
    assert_eq!(outcome.phase, Some(Phase::Predecessor));
    let issues = outcome
        .net_new
        .get("Compat issues with assembly Foo.dll")
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert!(issues.contains("Removed method Bar"));
    assert_eq!(tool.calls(), vec![(pred, fx.artifact("1.1.0"))]);
}

#[test]
fn allowlisted_issue_passes() {
    let fx = Fixture::new();
    let pred = fx.build("1.0.0");
    fx.build("1.1.0");
    fx.allow("1.1.0", "Compat issues with assembly Foo.dll\nRemoved method Bar\n");
    let tool = ScriptedTool::new().with(&pred, FOO_REPORT);

    let outcome = CompatChecker::new(&fx.ladder, &tool)
        .check(&fx.request("1.1.0", "2.0.0"))
        .unwrap();

    assert_eq!(outcome.verdict, Verdict::Pass);
    assert!(outcome.net_new.is_empty());
}

#[test]
fn missing_predecessor_artifacts_skip_to_pass() {
    let fx = Fixture::new();
    fx.build("1.1.0");
    let tool = ScriptedTool::new();

    let outcome = CompatChecker::new(&fx.ladder, &tool)
        .check(&fx.request("1.1.0", "2.0.0"))
        .unwrap();

    assert!(outcome.is_pass());
    assert!(tool.calls().is_empty());
    assert!(matches!(
        outcome.skipped[0],
        Skip::PredecessorMissing { .. }
    ));
    assert_eq!(outcome.skipped[1], Skip::NotLatestStable);
}

#[test]
fn latest_stable_without_reference_warns_and_passes() {
    let fx = Fixture::new();
    let pred = fx.build("1.1.0");
    fx.build("2.0.0");
    let tool = ScriptedTool::new().with(&pred, "");

    let outcome = CompatChecker::new(&fx.ladder, &tool)
        .check(&fx.request("2.0.0", "2.0.0"))
        .unwrap();

    assert!(outcome.is_pass());
    assert_eq!(tool.calls().len(), 1);
    assert!(matches!(
        outcome.skipped.last(),
        Some(Skip::ReferenceMissing { .. })
    ));
}

#[test]
fn latest_stable_runs_reference_comparison() {
    let fx = Fixture::new();
    fx.build("2.0.0");
    let reference = fx.reference();
    let tool = ScriptedTool::new().with(&reference, FOO_REPORT);

    let outcome = CompatChecker::new(&fx.ladder, &tool)
        .check(&fx.request("2.0.0", "2.0.0"))
        .unwrap();

    assert_eq!(outcome.verdict, Verdict::Fail);
    assert_eq!(outcome.phase, Some(Phase::Reference));
    assert_eq!(tool.calls(), vec![(reference, fx.artifact("2.0.0"))]);
}

#[test]
fn same_allowlist_covers_reference_comparison() {
    let fx = Fixture::new();
    let pred = fx.build("1.1.0");
    fx.build("2.0.0");
    let reference = fx.reference();
    fx.allow(
        "2.0.0",
        "Compat issues with assembly Foo.dll\nRemoved method Bar\nRemoved type Old\n",
    );
    let tool = ScriptedTool::new()
        .with(&pred, "Compat issues with assembly Foo.dll\nRemoved type Old\n")
        .with(&reference, FOO_REPORT);

    let outcome = CompatChecker::new(&fx.ladder, &tool)
        .check(&fx.request("2.0.0", "2.0.0"))
        .unwrap();

    assert!(outcome.is_pass());
    assert_eq!(tool.calls().len(), 2);
}

#[test]
fn predecessor_failure_short_circuits_reference() {
    let fx = Fixture::new();
    let pred = fx.build("1.1.0");
    fx.build("2.0.0");
    fx.reference();
    let tool = ScriptedTool::new().with(&pred, FOO_REPORT);

    let outcome = CompatChecker::new(&fx.ladder, &tool)
        .check(&fx.request("2.0.0", "2.0.0"))
        .unwrap();

    assert_eq!(outcome.phase, Some(Phase::Predecessor));
    assert_eq!(tool.calls().len(), 1);
}

#[test]
fn first_in_series_skips_predecessor() {
    let fx = Fixture::new();
    fx.build("1.0.0");
    let tool = ScriptedTool::new();

    let outcome = CompatChecker::new(&fx.ladder, &tool)
        .check(&fx.request("1.0.0", "2.0.0"))
        .unwrap();

    assert!(outcome.is_pass());
    assert_eq!(outcome.skipped[0], Skip::FirstInSeries);
    assert!(tool.calls().is_empty());
}

#[test]
fn unknown_version_is_configuration_error() {
    let fx = Fixture::new();
    let tool = ScriptedTool::new();
    let err = CompatChecker::new(&fx.ladder, &tool)
        .check(&fx.request("9.9.9", "2.0.0"))
        .unwrap_err();
    assert!(matches!(err, GateError::UnknownVersion { ref version } if version == "9.9.9"));
    assert!(err.is_configuration_error());
}

#[test]
fn malformed_allowlist_is_fatal() {
    let fx = Fixture::new();
    let pred = fx.build("1.0.0");
    fx.build("1.1.0");
    fx.allow("1.1.0", "Removed method Bar\n");
    let tool = ScriptedTool::new().with(&pred, FOO_REPORT);

    let err = CompatChecker::new(&fx.ladder, &tool)
        .check(&fx.request("1.1.0", "2.0.0"))
        .unwrap_err();
    assert!(matches!(err, GateError::MalformedAllowlist { .. }));
}

#[test]
fn malformed_tool_output_is_fatal() {
    let fx = Fixture::new();
    let pred = fx.build("1.0.0");
    fx.build("1.1.0");
    let tool = ScriptedTool::new().with(&pred, "Unhandled exception: oops\n");

    let err = CompatChecker::new(&fx.ladder, &tool)
        .check(&fx.request("1.1.0", "2.0.0"))
        .unwrap_err();
    assert!(matches!(err, GateError::MalformedReport { line: 1, .. }));
}

#[test]
fn tool_failure_propagates() {
    let fx = Fixture::new();
    fx.build("1.0.0");
    fx.build("1.1.0");

    let err = CompatChecker::new(&fx.ladder, FailingTool)
        .check(&fx.request("1.1.0", "2.0.0"))
        .unwrap_err();
    assert!(matches!(err, GateError::Tool(ToolError::Failed { .. })));
    assert!(!err.is_configuration_error());
}
