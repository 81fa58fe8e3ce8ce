//! Runs one command script through the engine's client and times it.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use qbench_core::errors::{BenchError, ErrorInfo};
use qbench_gen::CommandScript;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::spec::EngineSpec;
use crate::ScriptRunner;

const STDERR_TAIL_BYTES: u64 = 512;

/// Synchronous client invocation with a wall-clock bound.
///
/// The executor never touches engine state; it assumes the controller has
/// already brought the server up.
#[derive(Debug, Clone)]
pub struct TrialExecutor {
    client_command: Vec<String>,
    workdir: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl TrialExecutor {
    pub fn new(client_command: Vec<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            client_command,
            workdir: workdir.into(),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_micros(100),
        }
    }

    pub fn from_spec(spec: &EngineSpec) -> Self {
        Self {
            client_command: spec.client_command.clone(),
            workdir: spec.source_dir.clone(),
            timeout: spec.trial_timeout(),
            poll_interval: spec.poll_interval(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_micros(1));
        self
    }

    /// Executes `script` and returns the elapsed wall-clock time in microseconds.
    pub fn execute(&self, script: &CommandScript) -> Result<u64, BenchError> {
        self.execute_text(&script.render())
    }

    /// Executes raw command text. The text is materialised to a temporary
    /// file which becomes the client's entire standard input.
    pub fn execute_text(&self, text: &str) -> Result<u64, BenchError> {
        let Some((program, args)) = self.client_command.split_first() else {
            return Err(BenchError::configuration(
                "client-command-empty",
                "client command must name a program",
            ));
        };
        let mut script_file = NamedTempFile::new().map_err(|err| io_error("trial-script-create", err))?;
        script_file
            .write_all(text.as_bytes())
            .and_then(|()| script_file.flush())
            .map_err(|err| io_error("trial-script-write", err))?;
        let stdin = script_file
            .reopen()
            .map_err(|err| io_error("trial-script-open", err))?;
        let mut stderr_sink = tempfile::tempfile().map_err(|err| io_error("trial-stderr-create", err))?;
        let stderr = stderr_sink
            .try_clone()
            .map_err(|err| io_error("trial-stderr-clone", err))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr));

        let started = Instant::now();
        let mut child = command.spawn().map_err(|err| {
            BenchError::Execution(
                ErrorInfo::new("client-spawn", "failed to launch the client")
                    .with_context("program", program.clone())
                    .with_context("workdir", self.workdir.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
        let status = self.wait_bounded(&mut child, started)?;
        let elapsed = started.elapsed();

        if !status.success() {
            let tail = read_tail(&mut stderr_sink);
            return Err(BenchError::Execution(
                ErrorInfo::new("client-exit", "client exited unsuccessfully")
                    .with_context("status", status.to_string())
                    .with_context("stderr", tail)
                    .with_hint("the engine may not be running or still settling"),
            ));
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        debug!(elapsed_us = micros, "trial completed");
        Ok(micros)
    }

    fn wait_bounded(&self, child: &mut Child, started: Instant) -> Result<ExitStatus, BenchError> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if started.elapsed() >= self.timeout => {
                    warn!(timeout_ms = self.timeout.as_millis() as u64, "client exceeded trial bound");
                    kill_and_reap(child);
                    return Err(BenchError::Timeout(
                        ErrorInfo::new("trial-timeout", "client did not finish within the trial bound")
                            .with_context("timeout_ms", self.timeout.as_millis().to_string()),
                    ));
                }
                Ok(None) => thread::sleep(self.poll_interval),
                Err(err) => {
                    kill_and_reap(child);
                    return Err(BenchError::Execution(
                        ErrorInfo::new("client-wait", "failed to wait for the client")
                            .with_hint(err.to_string()),
                    ));
                }
            }
        }
    }
}

impl ScriptRunner for TrialExecutor {
    fn run_script(&mut self, script: &CommandScript) -> Result<u64, BenchError> {
        self.execute(script)
    }
}

/// Kills the client and waits for it so no zombie outlives the trial.
fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn io_error(code: &str, err: std::io::Error) -> BenchError {
    BenchError::Execution(ErrorInfo::new(code, "trial scratch file failure").with_hint(err.to_string()))
}

fn read_tail(file: &mut File) -> String {
    let len = file.seek(SeekFrom::End(0)).unwrap_or(0);
    let start = len.saturating_sub(STDERR_TAIL_BYTES);
    if file.seek(SeekFrom::Start(start)).is_err() {
        return String::new();
    }
    let mut buf = Vec::new();
    let _ = file.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).trim().to_string()
}
