// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `compat-gate` — build-time API compatibility gate.
//!
//! Runs after compilation: compares the freshly built artifacts against the
//! previous version's build and, for the latest stable release, against a
//! reference contract, then fails the build if issues remain that the
//! version's allowlist does not accept.
//!
//! Exit status is non-zero on a compatibility break, on a configuration
//! error (unknown version, malformed allowlist), and on checker failure.

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod fs_store;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();

    match cli.command {
        Commands::Check(args) => commands::run_check(&cli.config_dir, cli.json, args),
        Commands::Diff { report, allowlist } => {
            commands::run_diff(cli.json, &report, allowlist.as_deref())
        }
        Commands::Ladder { version } => commands::run_ladder(&cli.config_dir, cli.json, version),
        Commands::Validate { files } => commands::run_validate(cli.json, &files),
        Commands::Init { force } => commands::run_init(&cli.config_dir, force),
    }
}
