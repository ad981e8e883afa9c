// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Process-backed [`CompatTool`] for the compatibility gate.
//!
//! Launches the external checker as
//! `[launcher] program [args..] <contract> --impl-dirs <implementation>` and
//! returns its standard output.
//!
//! Invariants:
//! - stdout and stderr are drained on helper threads while the calling thread
//!   owns the `Child`, so a chatty tool cannot deadlock on a full pipe.
//! - stdout beyond the output limit (default [`MAX_OUTPUT_BYTES`]) is an
//!   error, never a truncated report. stderr is cut at the limit.
//! - On unix the checker leads its own process group, and the whole group is
//!   killed once the checker exits or is abandoned, so launcher and wrapper
//!   descendants never outlive [`run`](CompatTool::run).
//! - The child is always reaped: on normal exit, on timeout (kill + bounded
//!   reap), and when a pipe cannot be taken.

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use compat_gate_core::config::{ToolConfig, DEFAULT_TOOL_TIMEOUT};
use compat_gate_core::{CompatTool, ToolError};
use tracing::debug;

/// Default upper bound on bytes read from each of stdout and stderr.
pub const MAX_OUTPUT_BYTES: u64 = 64 * 1024 * 1024;

/// Interval between exit polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for a killed child to be reaped.
const PROCESS_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a drain thread after the child is gone. A descendant
/// that inherited the pipe can keep it open past the child's exit.
const THREAD_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Flag that introduces the implementation directory on the checker command line.
pub const IMPL_DIRS_FLAG: &str = "--impl-dirs";

type Drain = JoinHandle<io::Result<Vec<u8>>>;

/// Runs the external compatibility checker as a child process.
#[derive(Debug, Clone)]
pub struct ProcessCompatTool {
    program: PathBuf,
    launcher: Option<PathBuf>,
    args: Vec<String>,
    timeout: Duration,
    output_limit: u64,
}

impl ProcessCompatTool {
    /// Tool that runs `program` with the platform's default launcher.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            launcher: None,
            args: Vec::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
            output_limit: MAX_OUTPUT_BYTES,
        }
    }

    /// Build from config. Returns `None` when no program is configured.
    pub fn from_config(cfg: &ToolConfig) -> Option<Self> {
        let program = cfg.program.clone()?;
        let mut tool = Self::new(program)
            .with_args(cfg.args.clone())
            .with_timeout(cfg.timeout());
        tool.launcher.clone_from(&cfg.launcher);
        Some(tool)
    }

    /// Run `program` through `launcher` (e.g. `dotnet`, `mono`, `sh`).
    pub fn with_launcher(mut self, launcher: impl Into<PathBuf>) -> Self {
        self.launcher = Some(launcher.into());
        self
    }

    /// Extra arguments placed before the contract/implementation pair.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Bound on one invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap on captured bytes per stream. A report larger than this fails with
    /// [`ToolError::OutputTooLarge`].
    pub fn with_output_limit(mut self, bytes: u64) -> Self {
        self.output_limit = bytes;
        self
    }

    /// Configured bound on one invocation.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The executable and arguments that [`run`](CompatTool::run) would spawn.
    pub fn command_line(&self, contract: &Path, implementation: &Path) -> (OsString, Vec<OsString>) {
        let mut argv: Vec<OsString> = Vec::with_capacity(self.args.len() + 4);
        let launcher = self
            .launcher
            .as_ref()
            .map(|l| l.as_os_str().to_owned())
            .or_else(|| default_launcher(&self.program).map(OsString::from));
        let exe = match launcher {
            Some(launcher) => {
                argv.push(self.program.clone().into_os_string());
                launcher
            }
            None => self.program.clone().into_os_string(),
        };
        argv.extend(self.args.iter().map(OsString::from));
        argv.push(contract.as_os_str().to_owned());
        argv.push(OsString::from(IMPL_DIRS_FLAG));
        argv.push(implementation.as_os_str().to_owned());
        (exe, argv)
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Launcher needed to run `program` on this platform, if any.
///
/// Windows runs managed executables directly. Elsewhere a `.exe` goes through
/// `mono` and a `.dll` through `dotnet`.
#[cfg(windows)]
pub fn default_launcher(_program: &Path) -> Option<&'static str> {
    None
}

/// Launcher needed to run `program` on this platform, if any.
///
/// Windows runs managed executables directly. Elsewhere a `.exe` goes through
/// `mono` and a `.dll` through `dotnet`.
#[cfg(not(windows))]
pub fn default_launcher(program: &Path) -> Option<&'static str> {
    let ext = program.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("exe") {
        Some("mono")
    } else if ext.eq_ignore_ascii_case("dll") {
        Some("dotnet")
    } else {
        None
    }
}

impl CompatTool for ProcessCompatTool {
    fn run(&self, contract: &Path, implementation: &Path) -> Result<String, ToolError> {
        let (exe, argv) = self.command_line(contract, implementation);
        let program = self.program_name();
        debug!(exe = ?exe, args = ?argv, timeout = ?self.timeout, "spawning compatibility checker");

        let mut command = Command::new(&exe);
        command
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut child = command.spawn().map_err(|source| ToolError::Launch {
            program: exe.to_string_lossy().into_owned(),
            source,
        })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = bounded_reap(&mut child, &program);
            return Err(ToolError::Io {
                context: "taking checker output pipes",
                source: io::Error::other("stdio pipe missing"),
            });
        };
        let out = drain(stdout, self.output_limit);
        let err = drain(stderr, self.output_limit);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    let _ = bounded_reap(&mut child, &program);
                    return Err(ToolError::Io {
                        context: "waiting for checker",
                        source,
                    });
                }
            }
            if Instant::now() >= deadline {
                bounded_reap(&mut child, &program)?;
                drop(child);
                let _ = join_bounded(out);
                let _ = join_bounded(err);
                return Err(ToolError::Timeout {
                    program,
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };
        // Stragglers still hold the output pipes open.
        kill_group(&child);

        let stdout = collect(out, "reading checker stdout")?;
        let mut stderr = collect(err, "reading checker stderr")?;
        if exceeds(stdout.len(), self.output_limit) {
            return Err(ToolError::OutputTooLarge {
                program,
                limit: self.output_limit,
            });
        }
        stderr.truncate(usize::try_from(self.output_limit).unwrap_or(usize::MAX));
        let report = String::from_utf8_lossy(&stdout).into_owned();

        if !status.success() && report.trim().is_empty() {
            return Err(ToolError::Failed {
                program,
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_owned(),
            });
        }
        debug!(%status, bytes = report.len(), "compatibility checker finished");
        Ok(report)
    }
}

/// Read up to `limit + 1` bytes so an overflowing stream is detectable.
fn drain<R>(pipe: R, limit: u64) -> Drain
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.take(limit.saturating_add(1)).read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn exceeds(len: usize, limit: u64) -> bool {
    !u64::try_from(len).is_ok_and(|len| len <= limit)
}

/// Kill every process in the checker's group.
#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(child.id()) else {
        return;
    };
    // ESRCH once the group is empty.
    let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

/// Join a drain thread, giving up after [`THREAD_JOIN_TIMEOUT`].
fn join_bounded(handle: Drain) -> Option<io::Result<Vec<u8>>> {
    let deadline = Instant::now() + THREAD_JOIN_TIMEOUT;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            // Stuck on a pipe held open by a descendant; abandon the thread.
            return None;
        }
        thread::sleep(POLL_INTERVAL);
    }
    match handle.join() {
        Ok(result) => Some(result),
        Err(_) => Some(Err(io::Error::other("drain thread panicked"))),
    }
}

fn collect(handle: Drain, context: &'static str) -> Result<Vec<u8>, ToolError> {
    match join_bounded(handle) {
        Some(Ok(bytes)) => Ok(bytes),
        Some(Err(source)) => Err(ToolError::Io { context, source }),
        None => Err(ToolError::Io {
            context,
            source: io::Error::new(io::ErrorKind::TimedOut, "output pipe still open after exit"),
        }),
    }
}

/// Reap `child`, killing it and its process group first. Bounded by
/// [`PROCESS_REAP_TIMEOUT`].
fn bounded_reap(child: &mut Child, program: &str) -> Result<Option<ExitStatus>, ToolError> {
    kill_group(child);
    match child.try_wait() {
        Ok(Some(status)) => return Ok(Some(status)),
        Ok(None) => {}
        Err(_) => return Ok(None),
    }
    let _ = child.kill();
    let deadline = Instant::now() + PROCESS_REAP_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(_) => return Ok(None),
        }
        if Instant::now() >= deadline {
            return Err(ToolError::ReapTimeout {
                program: program.to_owned(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}
