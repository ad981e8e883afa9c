// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Version-aware API compatibility gate.
//!
//! `compat-gate-core` turns the free-text report of an external binary
//! compatibility checker into a structured pass/fail decision. It owns the
//! pieces with real logic:
//!
//! - [`ladder`] — fixed version succession table ([`VersionLadder`]).
//! - [`report`] — checker report / allowlist parser ([`IssueReport`]).
//! - [`baseline`] — per-version allowlist loader.
//! - [`diff`] — subtraction of accepted issues from found issues.
//! - [`checker`] — the two-phase orchestrator ([`CompatChecker`]) and the
//!   [`CompatTool`] port through which the external checker is driven.
//!
//! Launching the checker process lives in `compat-gate-process`; argument
//! parsing and config file storage live in the `compat-gate` binary.
//!
//! # Determinism
//!
//! Buckets in an [`IssueReport`] keep first-seen order and issue lines are
//! stored in a `BTreeSet`, so rendering the same input always produces the
//! same diagnostics.
#![forbid(unsafe_code)]

pub mod baseline;
pub mod checker;
pub mod config;
pub mod diff;
mod error;
pub mod ladder;
pub mod outcome;
pub mod report;

pub use checker::{CheckRequest, CompatChecker, CompatTool};
pub use error::{GateError, ToolError};
pub use ladder::{VersionId, VersionLadder};
pub use outcome::{CheckOutcome, Phase, Skip, Verdict};
pub use report::IssueReport;
