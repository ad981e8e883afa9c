// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command-line surface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "compat-gate",
    version,
    about = "Version-aware API compatibility gate",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Directory holding `compat-gate.json`.
    #[arg(long, global = true, default_value = ".")]
    pub config_dir: PathBuf,

    /// Print machine-readable JSON on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a freshly built version against its predecessor and the reference contract.
    Check(CheckArgs),
    /// Diff a saved checker report against an allowlist file.
    Diff {
        /// Raw checker output.
        #[arg(long)]
        report: PathBuf,
        /// Allowlist to subtract; a missing file accepts nothing.
        #[arg(long)]
        allowlist: Option<PathBuf>,
    },
    /// Show the version ladder, or the predecessor of one version.
    Ladder {
        /// Version to look up.
        version: Option<String>,
    },
    /// Parse allowlist files and report their issue counts.
    Validate {
        /// Allowlist files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Write a `compat-gate.json` with the current defaults.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Version being built.
    #[arg(long)]
    pub current: String,

    /// Directory of the freshly built artifacts; must contain the current version once.
    #[arg(long)]
    pub impl_dir: PathBuf,

    /// Declared latest stable version (overrides config).
    #[arg(long)]
    pub last_stable: Option<String>,

    /// Root holding `<version>.txt` allowlists (overrides config).
    #[arg(long)]
    pub allowlist_dir: Option<PathBuf>,

    /// Reference contract directory name under the allowlist root (overrides config).
    #[arg(long)]
    pub reference_dir_name: Option<String>,

    /// External checker program (overrides config).
    #[arg(long)]
    pub tool: Option<PathBuf>,

    /// Launcher for the checker, e.g. `dotnet` or `mono` (overrides config).
    #[arg(long)]
    pub launcher: Option<PathBuf>,

    /// Extra checker argument, repeatable (replaces configured args).
    #[arg(long = "tool-arg", allow_hyphen_values = true)]
    pub tool_args: Vec<String>,

    /// Upper bound on each checker run, in seconds (overrides config).
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}
