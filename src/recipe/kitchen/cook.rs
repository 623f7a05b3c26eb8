// src/recipe/kitchen/cook.rs

//! Builder: run a recipe's configure/build/install steps
//!
//! Each step is rendered from its template and run as `sh -c <step>` inside
//! the package directory (or the phase's `dir`). stdout and stderr share one
//! pipe, so lines reach the [`OutputSink`] interleaved in the order the
//! child wrote them, and the same lines are kept in the [`StepResult`].

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::filesystem::path::safe_join;
use crate::recipe::format::{Phase, Recipe, StepContext};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::fs;
use std::io::{BufRead, BufReader};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// How often a running step is checked for cancellation and timeout
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Receives build output as it is produced
pub trait OutputSink: Send + Sync {
    fn line(&self, phase: Phase, line: &str);
}

/// Forwards build output to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl OutputSink for LogSink {
    fn line(&self, phase: Phase, line: &str) {
        info!(target: "setpm::build", "[{}] {}", phase, line);
    }
}

/// What to do when a step exits unsuccessfully
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the group and fail the build
    #[default]
    FailFast,
    /// Record a warning and run the next step
    KeepGoing,
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub phase: Phase,
    /// Rendered command line
    pub command: String,
    /// `None` when the child was killed by a signal
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr
    pub output: String,
}

impl StepResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Everything the builder ran
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub steps: Vec<StepResult>,
    pub warnings: Vec<String>,
}

impl BuildReport {
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| !s.success())
    }
}

/// Runs step groups for one recipe
pub struct Builder<'a> {
    pub recipe: &'a Recipe,
    pub package_dir: &'a Path,
    pub install_dir: &'a Path,
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub policy: FailurePolicy,
    pub sink: &'a dyn OutputSink,
    pub cancel: &'a CancelToken,
}

impl Builder<'_> {
    /// Run every step of `phase`; an empty group spawns nothing
    pub fn run_phase(&self, phase: Phase, report: &mut BuildReport) -> Result<()> {
        let group = self.recipe.build.group(phase);
        if group.is_empty() {
            debug!("No {} steps, skipping", phase);
            return Ok(());
        }

        let workdir = match &group.dir {
            Some(dir) => safe_join(self.package_dir, dir)?,
            None => self.package_dir.to_path_buf(),
        };
        fs::create_dir_all(&workdir).map_err(|e| {
            Error::IoError(format!("Failed to create {}: {}", workdir.display(), e))
        })?;

        let ctx = StepContext {
            prefix: self.install_dir,
            srcdir: self.package_dir,
            jobs: self.jobs,
        };

        info!("Running {} phase ({} steps)", phase, group.steps.len());
        for template in &group.steps {
            let command = self.recipe.substitute(template, &ctx);
            let result = self.run_step(phase, &command, &workdir)?;
            let success = result.success();
            let exit_code = result.exit_code;
            report.steps.push(result);

            if success {
                continue;
            }
            let failure = Error::BuildFailed {
                phase: phase.to_string(),
                step: command,
                exit_code,
            };
            match self.policy {
                FailurePolicy::FailFast => return Err(failure),
                FailurePolicy::KeepGoing => {
                    warn!("{}; continuing", failure);
                    report.warnings.push(failure.to_string());
                }
            }
        }

        Ok(())
    }

    /// Run one rendered command and wait for it
    ///
    /// A non-zero exit is not an error here; it is returned in the
    /// [`StepResult`] for the caller's policy to judge. Errors are reserved
    /// for spawn failures, timeouts and cancellation.
    pub fn run_step(&self, phase: Phase, command: &str, workdir: &Path) -> Result<StepResult> {
        self.cancel.check()?;
        debug!("Command: {}", command);

        let spawn_error = |reason: String| Error::BuildSpawn {
            phase: phase.to_string(),
            step: command.to_string(),
            reason,
        };

        let (reader, writer) = std::io::pipe().map_err(|e| spawn_error(e.to_string()))?;
        let mut child = {
            let stdout = writer.try_clone().map_err(|e| spawn_error(e.to_string()))?;
            let mut cmd = Command::new("sh");
            cmd.arg("-c")
                .arg(command)
                .current_dir(workdir)
                .env("PREFIX", self.install_dir)
                .env("SRCDIR", self.package_dir)
                .env("MAKEFLAGS", format!("-j{}", self.jobs))
                .stdin(Stdio::null())
                .stdout(stdout)
                .stderr(writer)
                .process_group(0);
            // `cmd` drops at the end of this block, closing our copies of the
            // write end so the reader sees EOF when the child exits
            cmd.spawn().map_err(|e| spawn_error(e.to_string()))?
        };

        let sink = self.sink;
        let (status, output) = std::thread::scope(|scope| {
            let collector = scope.spawn(move || {
                let mut output = String::new();
                let mut reader = BufReader::new(reader);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            let line = String::from_utf8_lossy(&buf);
                            let line = line.trim_end_matches(['\n', '\r']);
                            sink.line(phase, line);
                            output.push_str(line);
                            output.push('\n');
                        }
                    }
                }
                output
            });

            let status = self.wait(&mut child, phase, command);
            // background jobs the step left running would hold the pipe open
            kill_group(&child);
            let output = collector.join().unwrap_or_default();
            (status, output)
        });

        let status = status?;
        Ok(StepResult {
            phase,
            command: command.to_string(),
            exit_code: status.code(),
            output,
        })
    }

    fn wait(&self, child: &mut Child, phase: Phase, command: &str) -> Result<ExitStatus> {
        let started = Instant::now();
        loop {
            match child.wait_timeout(POLL_INTERVAL) {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => {
                    kill(child);
                    return Err(Error::IoError(format!("Failed to wait for {} step: {}", phase, e)));
                }
            }

            if self.cancel.is_cancelled() {
                warn!("Cancelling {} step `{}`", phase, command);
                kill(child);
                return Err(Error::Cancelled);
            }

            if let Some(timeout) = self.timeout
                && started.elapsed() >= timeout
            {
                warn!("{} step `{}` exceeded {:?}, killing it", phase, command, timeout);
                kill(child);
                return Err(Error::BuildTimeout {
                    phase: phase.to_string(),
                    step: command.to_string(),
                    timeout,
                });
            }
        }
    }
}

/// Kill the step's whole process group and reap the shell
fn kill(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

/// SIGKILL whatever is left in the step's process group
fn kill_group(child: &Child) {
    if let Ok(pid) = i32::try_from(child.id()) {
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
}
