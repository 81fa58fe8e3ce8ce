//! Static description of how to build, run and talk to the engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use qbench_core::errors::{BenchError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// How engine configuration values reach the build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildParamStyle {
    /// Appended to the build command as `NAME=value` arguments (make overrides).
    #[default]
    MakeVariables,
    /// Exported to the build command's environment.
    Environment,
}

/// Commands, paths and time bounds for one engine checkout.
///
/// Every command runs with `source_dir` as its working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSpec {
    #[serde(default = "EngineSpec::default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "EngineSpec::default_clean_command")]
    pub clean_command: Vec<String>,
    #[serde(default = "EngineSpec::default_build_command")]
    pub build_command: Vec<String>,
    #[serde(default)]
    pub build_params: BuildParamStyle,
    #[serde(default = "EngineSpec::default_server_command")]
    pub server_command: Vec<String>,
    #[serde(default = "EngineSpec::default_client_command")]
    pub client_command: Vec<String>,
    /// Delay after spawning the server before it is considered ready.
    #[serde(default = "EngineSpec::default_settle_ms")]
    pub settle_ms: u64,
    /// Upper bound for one client invocation.
    #[serde(default = "EngineSpec::default_trial_timeout_secs")]
    pub trial_timeout_secs: u64,
    #[serde(default = "EngineSpec::default_poll_interval_us")]
    pub poll_interval_us: u64,
    /// Time a graceful shutdown gets before the process is killed.
    #[serde(default = "EngineSpec::default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    #[serde(default)]
    pub graceful_shutdown: bool,
    #[serde(default = "EngineSpec::default_server_log")]
    pub server_log: PathBuf,
    #[serde(default = "EngineSpec::default_build_log")]
    pub build_log: PathBuf,
}

impl EngineSpec {
    /// File created in `source_dir` while an engine is running.
    pub const LOCK_FILE: &'static str = ".qbench-engine.lock";

    fn default_source_dir() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_clean_command() -> Vec<String> {
        vec!["make".to_string(), "distclean".to_string()]
    }

    fn default_build_command() -> Vec<String> {
        vec!["make".to_string()]
    }

    fn default_server_command() -> Vec<String> {
        vec!["./server".to_string()]
    }

    fn default_client_command() -> Vec<String> {
        vec!["./client".to_string()]
    }

    const fn default_settle_ms() -> u64 {
        1_000
    }

    const fn default_trial_timeout_secs() -> u64 {
        30
    }

    const fn default_poll_interval_us() -> u64 {
        100
    }

    const fn default_stop_grace_ms() -> u64 {
        500
    }

    fn default_server_log() -> PathBuf {
        PathBuf::from("server.out")
    }

    fn default_build_log() -> PathBuf {
        PathBuf::from("compile.out")
    }

    /// Spec rooted at `source_dir` with every other field defaulted.
    pub fn for_source_dir(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            ..Self::default()
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn trial_timeout(&self) -> Duration {
        Duration::from_secs(self.trial_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us.max(1))
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.source_dir.join(Self::LOCK_FILE)
    }

    /// Resolves a log path against `source_dir` unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.source_dir.join(path)
        }
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        for (field, command) in [
            ("build_command", &self.build_command),
            ("server_command", &self.server_command),
            ("client_command", &self.client_command),
        ] {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(BenchError::Configuration(
                    ErrorInfo::new("engine-command-empty", "engine command must name a program")
                        .with_context("field", field),
                ));
            }
        }
        if self.trial_timeout_secs == 0 {
            return Err(BenchError::configuration(
                "engine-timeout-zero",
                "trial timeout must be at least one second",
            ));
        }
        Ok(())
    }
}

impl Default for EngineSpec {
    fn default() -> Self {
        Self {
            source_dir: Self::default_source_dir(),
            clean_command: Self::default_clean_command(),
            build_command: Self::default_build_command(),
            build_params: BuildParamStyle::default(),
            server_command: Self::default_server_command(),
            client_command: Self::default_client_command(),
            settle_ms: Self::default_settle_ms(),
            trial_timeout_secs: Self::default_trial_timeout_secs(),
            poll_interval_us: Self::default_poll_interval_us(),
            stop_grace_ms: Self::default_stop_grace_ms(),
            graceful_shutdown: false,
            server_log: Self::default_server_log(),
            build_log: Self::default_build_log(),
        }
    }
}
