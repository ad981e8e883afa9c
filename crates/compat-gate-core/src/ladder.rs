// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixed version succession table.
//!
//! Every version that is ever checked must appear here. An unknown version is
//! a configuration error, never a silent skip: when a new release line is
//! cut, [`BUILTIN_LADDER`] (or the `ladder` list in the config file) is
//! extended in the same change.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::GateError;

/// Release lines in succession order. The first entry has no predecessor.
pub const BUILTIN_LADDER: &[&str] = &[
    "1.0.0", "1.1.0", "2.0.0", "2.1.0", "2.2.0", "3.0.0", "3.1.0", "5.0.0", "6.0.0", "7.0.0",
    "8.0.0", "9.0.0", "10.0.0",
];

/// Opaque release identifier (e.g. a dotted version tag).
///
/// Compared by exact string equality. The only other use is verbatim
/// substitution inside artifact paths.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    /// Wrap a version string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// View the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VersionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for VersionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Errors raised while building a ladder from a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LadderError {
    /// The sequence had no entries.
    #[error("[LADDER_EMPTY] version ladder must list at least one version")]
    Empty,
    /// An entry was blank.
    #[error("[LADDER_BLANK] version ladder entry {index} is blank")]
    Blank {
        /// 0-based position of the blank entry.
        index: usize,
    },
    /// A version was listed twice.
    #[error("[LADDER_DUPLICATE] version `{version}` appears more than once in the ladder")]
    Duplicate {
        /// The repeated version id.
        version: String,
    },
}

/// Immutable mapping from each known version to its immediate predecessor.
///
/// The succession is linear: each version has exactly one predecessor
/// (except the first) and at most one successor.
#[derive(Debug, Clone)]
pub struct VersionLadder {
    chain: Vec<VersionId>,
    index: HashMap<VersionId, usize>,
}

impl VersionLadder {
    /// The compiled-in succession table.
    pub fn builtin() -> Self {
        // BUILTIN_LADDER is covered by the `builtin_table_is_valid` test.
        Self::from_validated(BUILTIN_LADDER.iter().copied().map(VersionId::from).collect())
    }

    /// Build a ladder from versions listed oldest first.
    pub fn from_sequence<I, V>(versions: I) -> Result<Self, LadderError>
    where
        I: IntoIterator<Item = V>,
        V: Into<VersionId>,
    {
        let chain: Vec<VersionId> = versions.into_iter().map(Into::into).collect();
        if chain.is_empty() {
            return Err(LadderError::Empty);
        }
        let mut seen = HashMap::with_capacity(chain.len());
        for (i, v) in chain.iter().enumerate() {
            if v.as_str().trim().is_empty() {
                return Err(LadderError::Blank { index: i });
            }
            if seen.insert(v.clone(), i).is_some() {
                return Err(LadderError::Duplicate {
                    version: v.to_string(),
                });
            }
        }
        Ok(Self { chain, index: seen })
    }

    fn from_validated(chain: Vec<VersionId>) -> Self {
        let index = chain
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
        Self { chain, index }
    }

    /// Look up the predecessor of `version`.
    ///
    /// - `None` — `version` is not in the ladder.
    /// - `Some(None)` — first version in the series; nothing to compare against.
    /// - `Some(Some(p))` — `p` is the immediate predecessor.
    pub fn predecessor_of(&self, version: &str) -> Option<Option<&VersionId>> {
        let &i = self.index.get(version)?;
        Some(i.checked_sub(1).map(|p| &self.chain[p]))
    }

    /// Like [`predecessor_of`](Self::predecessor_of), but an unknown version is
    /// a [`GateError::UnknownVersion`].
    pub fn resolve(&self, version: &VersionId) -> Result<Option<&VersionId>, GateError> {
        self.predecessor_of(version.as_str())
            .ok_or_else(|| GateError::UnknownVersion {
                version: version.to_string(),
            })
    }

    /// Returns `true` if `version` is listed.
    pub fn contains(&self, version: &str) -> bool {
        self.index.contains_key(version)
    }

    /// Versions oldest first.
    pub fn versions(&self) -> impl Iterator<Item = &VersionId> {
        self.chain.iter()
    }

    /// Number of versions in the ladder.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Returns `true` if the ladder lists no versions.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}
