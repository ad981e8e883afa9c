// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Subcommand handlers.
//!
//! Diagnostics go through `tracing` (stderr); results go to stdout so
//! `--json` output stays machine-readable.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use compat_gate_core::baseline::load_baseline;
use compat_gate_core::config::{ConfigService, GateConfig, CONFIG_KEY};
use compat_gate_core::diff::diff;
use compat_gate_core::{CheckOutcome, CheckRequest, CompatChecker, IssueReport, VersionId};
use compat_gate_process::ProcessCompatTool;
use serde::Serialize;
use tracing::{error, info};

use crate::cli::CheckArgs;
use crate::fs_store::FsConfigStore;

fn config_service(config_dir: &Path) -> ConfigService<FsConfigStore> {
    ConfigService::new(FsConfigStore::new(config_dir))
}

pub fn load_config(config_dir: &Path) -> Result<GateConfig> {
    let path = FsConfigStore::new(config_dir).path_for(CONFIG_KEY);
    config_service(config_dir)
        .load_gate_config()
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn emit_text(text: &str) -> Result<()> {
    let mut out = io::stdout().lock();
    out.write_all(text.as_bytes())?;
    Ok(())
}

/// Log every net-new issue at error level, then the total.
fn log_net_new(report: &IssueReport) {
    for bucket in report.assemblies() {
        error!("{}", bucket.header);
        for issue in &bucket.issues {
            error!("  {issue}");
        }
    }
    error!("Total Issues: {}", report.issue_count());
}

pub fn run_check(config_dir: &Path, json: bool, args: CheckArgs) -> Result<()> {
    let cfg = load_config(config_dir)?;
    let ladder = cfg
        .version_ladder()
        .context("invalid `ladder` in config")?;

    let last_stable = args
        .last_stable
        .map(VersionId::from)
        .or_else(|| cfg.last_stable.clone())
        .context("no last stable version: pass --last-stable or set `last_stable` in compat-gate.json")?;
    let allowlist_dir = args
        .allowlist_dir
        .or_else(|| cfg.allowlist_dir.clone())
        .context("no allowlist directory: pass --allowlist-dir or set `allowlist_dir` in compat-gate.json")?;
    let reference_dir_name = args
        .reference_dir_name
        .unwrap_or_else(|| cfg.reference_dir_name().to_owned());

    let mut tool_cfg = cfg.tool.clone();
    if args.tool.is_some() {
        tool_cfg.program = args.tool;
    }
    if args.launcher.is_some() {
        tool_cfg.launcher = args.launcher;
    }
    if !args.tool_args.is_empty() {
        tool_cfg.args = args.tool_args;
    }
    if args.timeout_secs.is_some() {
        tool_cfg.timeout_secs = args.timeout_secs;
    }
    let tool = ProcessCompatTool::from_config(&tool_cfg)
        .context("no compatibility checker: pass --tool or set `tool.program` in compat-gate.json")?;

    let request = CheckRequest {
        version: VersionId::from(args.current),
        last_stable,
        implementation: args.impl_dir,
        allowlist_dir,
        reference_dir_name,
    };
    info!(version = %request.version, last_stable = %request.last_stable, "checking API compatibility");

    let outcome = CompatChecker::new(&ladder, tool).check(&request)?;
    report_outcome(&outcome, json)
}

fn report_outcome(outcome: &CheckOutcome, json: bool) -> Result<()> {
    if json {
        emit_json(outcome)?;
    }
    if outcome.is_pass() {
        info!("{}", outcome.message);
        return Ok(());
    }
    log_net_new(&outcome.net_new);
    bail!("{}", outcome.message)
}

#[derive(Serialize)]
struct DiffOut<'a> {
    net_new_count: usize,
    net_new: &'a IssueReport,
}

pub fn run_diff(json: bool, report: &Path, allowlist: Option<&Path>) -> Result<()> {
    let raw = fs::read_to_string(report)
        .with_context(|| format!("failed to read report {}", report.display()))?;
    let found = IssueReport::parse(&raw)
        .with_context(|| format!("failed to parse report {}", report.display()))?;
    let accepted = match allowlist {
        Some(path) => load_baseline(path)?,
        None => None,
    };
    let net_new = diff(&found, accepted.as_ref());

    if json {
        emit_json(&DiffOut {
            net_new_count: net_new.issue_count(),
            net_new: &net_new,
        })?;
    } else if !net_new.is_empty() {
        emit_text(&net_new.to_string())?;
    }

    if net_new.is_empty() {
        info!("no net-new issues");
        return Ok(());
    }
    bail!("{} net-new issue(s)", net_new.issue_count())
}

#[derive(Serialize)]
struct LadderRung<'a> {
    version: &'a VersionId,
    predecessor: Option<&'a VersionId>,
}

pub fn run_ladder(config_dir: &Path, json: bool, version: Option<String>) -> Result<()> {
    let cfg = load_config(config_dir)?;
    let ladder = cfg
        .version_ladder()
        .context("invalid `ladder` in config")?;

    let rungs: Vec<LadderRung<'_>> = match &version {
        Some(v) => {
            let id = VersionId::from(v.as_str());
            let predecessor = ladder.resolve(&id)?;
            let version = ladder
                .versions()
                .find(|known| **known == id)
                .context("version vanished from ladder")?;
            vec![LadderRung {
                version,
                predecessor,
            }]
        }
        None => {
            let mut prev = None;
            ladder
                .versions()
                .map(|v| {
                    let rung = LadderRung {
                        version: v,
                        predecessor: prev,
                    };
                    prev = Some(v);
                    rung
                })
                .collect()
        }
    };

    if json {
        return emit_json(&rungs);
    }
    let mut text = String::new();
    for rung in &rungs {
        let pred = rung.predecessor.map_or("(none)", VersionId::as_str);
        text.push_str(&format!("{}\t{pred}\n", rung.version));
    }
    emit_text(&text)
}

#[derive(Serialize)]
struct ValidateOut {
    path: PathBuf,
    ok: bool,
    assemblies: usize,
    issues: usize,
    error: Option<String>,
}

pub fn run_validate(json: bool, files: &[PathBuf]) -> Result<()> {
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let parsed = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))
            .and_then(|raw| IssueReport::parse(&raw).map_err(anyhow::Error::from));
        let out = match parsed {
            Ok(report) => ValidateOut {
                path: path.clone(),
                ok: true,
                assemblies: report.assemblies().len(),
                issues: report.issue_count(),
                error: None,
            },
            Err(err) => {
                error!(path = %path.display(), "{err:#}");
                ValidateOut {
                    path: path.clone(),
                    ok: false,
                    assemblies: 0,
                    issues: 0,
                    error: Some(format!("{err:#}")),
                }
            }
        };
        results.push(out);
    }

    if json {
        emit_json(&results)?;
    } else {
        let mut text = String::new();
        for r in results.iter().filter(|r| r.ok) {
            text.push_str(&format!(
                "{}: {} issue(s) in {} assembly section(s)\n",
                r.path.display(),
                r.issues,
                r.assemblies
            ));
        }
        emit_text(&text)?;
    }

    let bad = results.iter().filter(|r| !r.ok).count();
    if bad > 0 {
        bail!("{bad} malformed allowlist file(s)");
    }
    Ok(())
}

pub fn run_init(config_dir: &Path, force: bool) -> Result<()> {
    let store = FsConfigStore::new(config_dir);
    let path = store.path_for(CONFIG_KEY);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let cfg = GateConfig {
        reference_dir_name: Some(compat_gate_core::config::DEFAULT_REFERENCE_DIR_NAME.to_owned()),
        ladder: Some(compat_gate_core::VersionLadder::builtin().versions().cloned().collect()),
        ..GateConfig::default()
    };
    info!(dir = %store.base().display(), "writing default config");
    ConfigService::new(store)
        .save(CONFIG_KEY, &cfg)
        .with_context(|| format!("failed to write {}", path.display()))?;
    emit_text(&format!("wrote {}\n", path.display()))
}
