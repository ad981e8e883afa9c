// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Gate configuration and its storage port.
//!
//! The config file is JSON. Every field is optional; command-line flags win
//! over file values, which win over built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::ladder::{LadderError, VersionLadder};
use crate::VersionId;

/// Logical key of the gate config blob.
pub const CONFIG_KEY: &str = "compat-gate";

/// Default name of the reference contract directory under the allowlist root.
pub const DEFAULT_REFERENCE_DIR_NAME: &str = "reference";

/// Default bound on one external checker invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(600);

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("config serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Thin service that serializes config values and delegates storage to a `ConfigStore`.
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Load the gate config, falling back to defaults when absent.
    pub fn load_gate_config(&self) -> Result<GateConfig, ConfigError> {
        Ok(self.load(CONFIG_KEY)?.unwrap_or_default())
    }
}

/// How to invoke the external checker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Checker executable (or `.dll`/`.exe` to run through a launcher).
    pub program: Option<PathBuf>,
    /// Explicit launcher, e.g. `dotnet` or `mono`.
    pub launcher: Option<PathBuf>,
    /// Extra arguments placed before the contract/implementation pair.
    pub args: Vec<String>,
    /// Upper bound on one invocation, in seconds.
    pub timeout_secs: Option<u64>,
}

impl ToolConfig {
    /// Configured timeout or [`DEFAULT_TOOL_TIMEOUT`].
    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map_or(DEFAULT_TOOL_TIMEOUT, Duration::from_secs)
    }
}

/// Persisted gate settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Declared latest stable version.
    pub last_stable: Option<VersionId>,
    /// Root holding `<version>.txt` allowlists and the reference directory.
    pub allowlist_dir: Option<PathBuf>,
    /// Name of the reference contract directory under `allowlist_dir`.
    pub reference_dir_name: Option<String>,
    /// External checker invocation.
    pub tool: ToolConfig,
    /// Versions oldest first; replaces the built-in ladder when set.
    pub ladder: Option<Vec<VersionId>>,
}

impl GateConfig {
    /// The ladder to use: the configured sequence, or the built-in table.
    pub fn version_ladder(&self) -> Result<VersionLadder, LadderError> {
        match &self.ladder {
            Some(seq) => VersionLadder::from_sequence(seq.iter().cloned()),
            None => Ok(VersionLadder::builtin()),
        }
    }

    /// Reference directory name, defaulting to [`DEFAULT_REFERENCE_DIR_NAME`].
    pub fn reference_dir_name(&self) -> &str {
        self.reference_dir_name
            .as_deref()
            .unwrap_or(DEFAULT_REFERENCE_DIR_NAME)
    }
}
