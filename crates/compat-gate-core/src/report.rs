// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parser for the external checker's text report.
//!
//! The same format is used for allowlist files:
//!
//! ```text
//! Compat issues with assembly <name>
//! <issue line>
//! ...
//! Total Issues: <n>
//! ```
//!
//! Header and terminator prefixes are matched case-insensitively. Anything
//! after the terminator is ignored.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::GateError;

/// Prefix of a line that opens an assembly bucket.
pub const ASSEMBLY_HEADER_PREFIX: &str = "Compat issues with assembly";

/// Prefix of the trailing summary line that ends a report.
pub const TOTAL_ISSUES_PREFIX: &str = "Total Issues:";

/// Issues reported under one assembly header line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyIssues {
    /// Full header line, e.g. `Compat issues with assembly Foo.dll`.
    pub header: String,
    /// Issue lines; duplicates collapse.
    pub issues: BTreeSet<String>,
}

impl AssemblyIssues {
    fn new(header: String) -> Self {
        Self {
            header,
            issues: BTreeSet::new(),
        }
    }
}

/// Structured report: assembly buckets in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueReport {
    assemblies: Vec<AssemblyIssues>,
}

fn has_prefix_ignore_case(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

impl IssueReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw checker output or allowlist text.
    ///
    /// Fails with [`GateError::MalformedReport`] if any non-blank line appears
    /// before the first assembly header; no partial report is returned.
    pub fn parse(raw: &str) -> Result<Self, GateError> {
        let mut report = Self::new();
        let mut current: Option<usize> = None;

        for (n, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if has_prefix_ignore_case(line, ASSEMBLY_HEADER_PREFIX) {
                current = Some(report.open_bucket(line));
                continue;
            }
            if has_prefix_ignore_case(line, TOTAL_ISSUES_PREFIX) {
                break;
            }
            let Some(bucket) = current else {
                return Err(GateError::MalformedReport {
                    line: n + 1,
                    text: line.to_owned(),
                });
            };
            report.assemblies[bucket].issues.insert(line.to_owned());
        }

        Ok(report)
    }

    /// Return the bucket index for `header`, creating an empty bucket if new.
    fn open_bucket(&mut self, header: &str) -> usize {
        if let Some(i) = self.position(header) {
            return i;
        }
        self.assemblies.push(AssemblyIssues::new(header.to_owned()));
        self.assemblies.len() - 1
    }

    fn position(&self, header: &str) -> Option<usize> {
        self.assemblies.iter().position(|a| a.header == header)
    }

    /// Add an issue line under `header`, opening the bucket if needed.
    pub fn insert(&mut self, header: &str, issue: impl Into<String>) {
        let i = self.open_bucket(header);
        self.assemblies[i].issues.insert(issue.into());
    }

    /// Issues recorded under the exact header line, if present.
    pub fn get(&self, header: &str) -> Option<&BTreeSet<String>> {
        self.assemblies
            .iter()
            .find(|a| a.header == header)
            .map(|a| &a.issues)
    }

    /// Buckets in first-seen order.
    pub fn assemblies(&self) -> &[AssemblyIssues] {
        &self.assemblies
    }

    pub(crate) fn assemblies_mut(&mut self) -> &mut Vec<AssemblyIssues> {
        &mut self.assemblies
    }

    /// Total number of issue lines across all buckets.
    pub fn issue_count(&self) -> usize {
        self.assemblies.iter().map(|a| a.issues.len()).sum()
    }

    /// Returns `true` if no bucket holds an issue line.
    pub fn is_empty(&self) -> bool {
        self.issue_count() == 0
    }
}

/// Renders the report in allowlist format, terminated by `Total Issues: <n>`.
impl fmt::Display for IssueReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bucket in &self.assemblies {
            writeln!(f, "{}", bucket.header)?;
            for issue in &bucket.issues {
                writeln!(f, "{issue}")?;
            }
        }
        writeln!(f, "{TOTAL_ISSUES_PREFIX} {}", self.issue_count())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    const FOO: &str = "Compat issues with assembly Foo.dll";

    #[test]
    fn parses_single_bucket() {
        let report =
            IssueReport::parse("Compat issues with assembly Foo.dll\nRemoved method Bar\nTotal Issues: 1\n")
                .unwrap();
        assert_eq!(report.assemblies().len(), 1);
        assert_eq!(report.assemblies()[0].header, FOO);
        assert!(report.get(FOO).unwrap().contains("Removed method Bar"));
        assert_eq!(report.issue_count(), 1);
    }

    #[test]
    fn parse_is_idempotent() {
        let raw = "Compat issues with assembly A\nx\ny\nCompat issues with assembly B\nz\n";
        assert_eq!(IssueReport::parse(raw).unwrap(), IssueReport::parse(raw).unwrap());
    }

    #[test]
    fn prefixes_match_case_insensitively() {
        let raw = "COMPAT ISSUES WITH ASSEMBLY Foo.dll\nissue one\ntotal issues: 1\nafter";
        let report = IssueReport::parse(raw).unwrap();
        assert_eq!(report.assemblies()[0].header, "COMPAT ISSUES WITH ASSEMBLY Foo.dll");
        assert_eq!(report.issue_count(), 1);
    }

    #[test]
    fn terminator_truncates_everything_after_it() {
        let raw = "Compat issues with assembly Foo.dll\na\nTotal Issues: 1\nCompat issues with assembly Late.dll\nb\n";
        let report = IssueReport::parse(raw).unwrap();
        assert_eq!(report.assemblies().len(), 1);
        assert!(report.get("Compat issues with assembly Late.dll").is_none());
        assert!(!report.get(FOO).unwrap().contains("b"));
    }

    #[test]
    fn duplicate_lines_collapse() {
        let raw = "Compat issues with assembly Foo.dll\nsame\nsame\n  same  \n";
        let report = IssueReport::parse(raw).unwrap();
        assert_eq!(report.issue_count(), 1);
    }

    #[test]
    fn blank_lines_and_crlf_are_ignored() {
        let raw = "\r\n   \r\nCompat issues with assembly Foo.dll\r\n\r\nRemoved method Bar\r\n";
        let report = IssueReport::parse(raw).unwrap();
        assert_eq!(report.get(FOO).unwrap().len(), 1);
        assert!(report.get(FOO).unwrap().contains("Removed method Bar"));
    }

    #[test]
    fn empty_bucket_is_kept() {
        let raw = "Compat issues with assembly Empty.dll\nCompat issues with assembly Foo.dll\nx\n";
        let report = IssueReport::parse(raw).unwrap();
        assert_eq!(report.assemblies().len(), 2);
        assert!(report.get("Compat issues with assembly Empty.dll").unwrap().is_empty());
    }

    #[test]
    fn buckets_keep_first_seen_order() {
        let raw = "Compat issues with assembly Zed\nz\nCompat issues with assembly Alpha\na\n";
        let report = IssueReport::parse(raw).unwrap();
        let headers: Vec<_> = report.assemblies().iter().map(|a| a.header.as_str()).collect();
        assert_eq!(
            headers,
            ["Compat issues with assembly Zed", "Compat issues with assembly Alpha"]
        );
    }

    #[test]
    fn repeated_header_reopens_bucket() {
        let raw = "Compat issues with assembly Foo.dll\na\nCompat issues with assembly B\nb\nCompat issues with assembly Foo.dll\nc\n";
        let report = IssueReport::parse(raw).unwrap();
        assert_eq!(report.assemblies().len(), 2);
        assert_eq!(report.get(FOO).unwrap().len(), 2);
    }

    #[test]
    fn issue_before_header_is_malformed() {
        let err = IssueReport::parse("\nRemoved method Bar\nCompat issues with assembly Foo.dll\n")
            .unwrap_err();
        match err {
            GateError::MalformedReport { line, text } => {
                assert_eq!(line, 2);
                assert_eq!(text, "Removed method Bar");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn leading_terminator_yields_empty_report() {
        let report = IssueReport::parse("Total Issues: 0\nstray\n").unwrap();
        assert!(report.assemblies().is_empty());
    }

    #[test]
    fn display_renders_allowlist_format() {
        let mut report = IssueReport::new();
        report.insert(FOO, "Removed method Bar");
        report.insert(FOO, "Removed method Baz");
        let text = report.to_string();
        assert_eq!(
            text,
            "Compat issues with assembly Foo.dll\nRemoved method Bar\nRemoved method Baz\nTotal Issues: 2\n"
        );
        assert_eq!(IssueReport::parse(&text).unwrap(), report);
    }
}
