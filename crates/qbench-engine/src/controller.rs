//! Lifecycle of the engine process: build, start, stop, reconfigure.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Instant;

use qbench_core::errors::{BenchError, ErrorInfo};
use qbench_core::EngineConfig;
use qbench_gen::{CommandScript, Statement};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::executor::TrialExecutor;
use crate::spec::{BuildParamStyle, EngineSpec};
use crate::EngineLifecycle;

/// Observable lifecycle state of the engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineState {
    NotBuilt,
    Building,
    Built,
    Running,
    Stopping,
    Stopped,
}

impl EngineState {
    pub fn label(self) -> &'static str {
        match self {
            EngineState::NotBuilt => "not-built",
            EngineState::Building => "building",
            EngineState::Built => "built",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
            EngineState::Stopped => "stopped",
        }
    }
}

/// Exclusive marker file held while an engine is running. Removed on drop.
#[derive(Debug)]
struct EngineLock {
    path: PathBuf,
}

impl EngineLock {
    fn acquire(path: &Path) -> Result<Self, BenchError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self {
                    path: path.to_path_buf(),
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(path).unwrap_or_default();
                Err(BenchError::Start(
                    ErrorInfo::new("engine-locked", "another harness holds the engine")
                        .with_context("lock", path.display().to_string())
                        .with_context("holder_pid", holder.trim().to_string())
                        .with_hint("stop the other sweep or remove a stale lock file"),
                ))
            }
            Err(err) => Err(BenchError::Start(
                ErrorInfo::new("engine-lock-io", "failed to create the engine lock")
                    .with_context("lock", path.display().to_string())
                    .with_hint(err.to_string()),
            )),
        }
    }
}

impl Drop for EngineLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), %err, "failed to remove engine lock");
        }
    }
}

/// Owns the engine process handle. The driver only sees it through
/// [`EngineLifecycle`].
#[derive(Debug)]
pub struct EngineController {
    spec: EngineSpec,
    config: EngineConfig,
    built_with: Option<EngineConfig>,
    state: EngineState,
    child: Option<Child>,
    lock: Option<EngineLock>,
}

impl EngineController {
    pub fn new(spec: EngineSpec) -> Result<Self, BenchError> {
        spec.validate()?;
        Ok(Self {
            spec,
            config: EngineConfig::default(),
            built_with: None,
            state: EngineState::NotBuilt,
            child: None,
            lock: None,
        })
    }

    /// Configuration the next build will use.
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn lifecycle_error(&self, code: &str, message: &str) -> BenchError {
        BenchError::Lifecycle(
            ErrorInfo::new(code, message).with_context("state", self.state.label()),
        )
    }

    fn log_file(&self, path: &Path) -> Result<File, std::io::Error> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.spec.resolve(path))
    }

    fn run_build_step(
        &self,
        step: &str,
        command: &[String],
        params: &[(String, String)],
    ) -> Result<(), BenchError> {
        let Some((program, args)) = command.split_first() else {
            return Ok(());
        };
        let build_error = |code: &str, message: &str, detail: String| {
            BenchError::Build(
                ErrorInfo::new(code, message)
                    .with_context("step", step)
                    .with_context("program", program.clone())
                    .with_context("log", self.spec.resolve(&self.spec.build_log).display().to_string())
                    .with_hint(detail),
            )
        };
        let log = self
            .log_file(&self.spec.build_log)
            .map_err(|err| build_error("build-log", "failed to open the build log", err.to_string()))?;
        let log_err = log
            .try_clone()
            .map_err(|err| build_error("build-log", "failed to open the build log", err.to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.spec.source_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        match self.spec.build_params {
            BuildParamStyle::MakeVariables => {
                cmd.args(params.iter().map(|(name, value)| format!("{name}={value}")));
            }
            BuildParamStyle::Environment => {
                cmd.envs(params.iter().map(|(name, value)| (name, value)));
            }
        }
        debug!(step, program = %program, "running build step");
        let status = cmd
            .status()
            .map_err(|err| build_error("build-spawn", "failed to launch the build step", err.to_string()))?;
        if !status.success() {
            return Err(build_error(
                "build-failed",
                "build step exited unsuccessfully",
                status.to_string(),
            ));
        }
        Ok(())
    }

    fn await_exit(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        if self.spec.graceful_shutdown {
            let deadline = Instant::now() + self.spec.stop_grace();
            while Instant::now() < deadline {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!(%status, "engine exited after shutdown");
                        self.child = None;
                        return;
                    }
                    Ok(None) => thread::sleep(self.spec.poll_interval()),
                    Err(_) => break,
                }
            }
        }
        if let Err(err) = child.kill() {
            debug!(%err, "engine kill reported an error");
        }
        match child.wait() {
            Ok(status) => debug!(%status, "engine process reaped"),
            Err(err) => warn!(%err, "failed to reap engine process"),
        }
        self.child = None;
    }

    fn send_shutdown(&self) {
        let script = CommandScript::new(vec![Statement::Shutdown]);
        let executor = TrialExecutor::from_spec(&self.spec).with_timeout(self.spec.stop_grace());
        if let Err(err) = executor.execute(&script) {
            warn!(code = %err.info().code, "graceful shutdown request failed");
        }
    }
}

impl EngineLifecycle for EngineController {
    fn build(&mut self, config: EngineConfig) -> Result<(), BenchError> {
        if matches!(self.state, EngineState::Running | EngineState::Stopping) {
            return Err(self.lifecycle_error("engine-running", "cannot build while the engine runs"));
        }
        config.validate()?;
        self.config = config;
        self.state = EngineState::Building;
        info!(config = %config.label(), "building engine");

        let params = config.build_params();
        if let Err(err) = self.run_build_step("clean", &self.spec.clean_command, &[]) {
            // A clean tree makes `distclean` fail; the build step decides.
            warn!(code = %err.info().code, "clean step failed");
        }
        if let Err(err) = self.run_build_step("build", &self.spec.build_command, &params) {
            self.state = EngineState::NotBuilt;
            self.built_with = None;
            return Err(err);
        }
        self.built_with = Some(config);
        self.state = EngineState::Built;
        info!(config = %config.label(), "engine built");
        Ok(())
    }

    fn start(&mut self) -> Result<(), BenchError> {
        match self.state {
            EngineState::Built | EngineState::Stopped => {}
            EngineState::Running | EngineState::Stopping => {
                return Err(self.lifecycle_error("engine-already-running", "engine is already running"));
            }
            EngineState::NotBuilt | EngineState::Building => {
                return Err(self.lifecycle_error("engine-not-built", "engine must be built before start"));
            }
        }
        if self.built_with != Some(self.config) {
            return Err(BenchError::Lifecycle(
                ErrorInfo::new("engine-rebuild-required", "configuration changed since the last build")
                    .with_context("configured", self.config.label())
                    .with_context(
                        "built",
                        self.built_with.map(|c| c.label()).unwrap_or_else(|| "none".to_string()),
                    ),
            ));
        }

        let lock = EngineLock::acquire(&self.spec.lock_path())?;
        let Some((program, args)) = self.spec.server_command.split_first() else {
            return Err(BenchError::configuration(
                "engine-command-empty",
                "server command must name a program",
            ));
        };
        let start_error = |code: &str, message: &str, detail: String| {
            BenchError::Start(
                ErrorInfo::new(code, message)
                    .with_context("program", program.clone())
                    .with_hint(detail),
            )
        };
        let log = self
            .log_file(&self.spec.server_log)
            .map_err(|err| start_error("server-log", "failed to open the server log", err.to_string()))?;
        let log_err = log
            .try_clone()
            .map_err(|err| start_error("server-log", "failed to open the server log", err.to_string()))?;
        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.spec.source_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|err| start_error("server-spawn", "failed to launch the engine", err.to_string()))?;

        thread::sleep(self.spec.settle());
        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                self.state = EngineState::Stopped;
                return Err(start_error(
                    "engine-exited-during-settle",
                    "engine exited before becoming ready",
                    status.to_string(),
                ));
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                self.state = EngineState::Stopped;
                return Err(start_error("server-wait", "failed to poll the engine", err.to_string()));
            }
        }
        info!(pid = child.id(), settle_ms = self.spec.settle_ms, "engine running");
        self.child = Some(child);
        self.lock = Some(lock);
        self.state = EngineState::Running;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BenchError> {
        if self.state != EngineState::Running {
            debug!(state = self.state.label(), "stop is a no-op");
            return Ok(());
        }
        self.state = EngineState::Stopping;
        if self.spec.graceful_shutdown {
            self.send_shutdown();
        }
        self.await_exit();
        self.lock = None;
        self.state = EngineState::Stopped;
        info!("engine stopped");
        Ok(())
    }

    fn reconfigure(&mut self, config: EngineConfig) -> Result<(), BenchError> {
        if matches!(self.state, EngineState::Running | EngineState::Stopping) {
            return Err(self.lifecycle_error(
                "engine-running",
                "reconfigure is only valid while the engine is stopped",
            ));
        }
        config.validate()?;
        if config != self.config {
            debug!(from = %self.config.label(), to = %config.label(), "engine reconfigured");
        }
        self.config = config;
        Ok(())
    }

    fn state(&self) -> EngineState {
        self.state
    }
}

impl Drop for EngineController {
    fn drop(&mut self) {
        if self.state == EngineState::Running {
            let _ = self.stop();
        }
    }
}
