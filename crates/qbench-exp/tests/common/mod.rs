use std::collections::VecDeque;

use qbench_core::errors::{BenchError, ErrorInfo};
use qbench_core::EngineConfig;
use qbench_engine::{EngineLifecycle, EngineState, ScriptRunner};
use qbench_gen::CommandScript;

/// Records lifecycle calls; optionally fails the build of one configuration.
#[derive(Debug, Default)]
pub struct FakeEngine {
    pub calls: Vec<String>,
    pub state: Option<EngineState>,
    pub fail_build_for: Option<EngineConfig>,
}

impl FakeEngine {
    fn current(&self) -> EngineState {
        self.state.unwrap_or(EngineState::NotBuilt)
    }
}

impl EngineLifecycle for FakeEngine {
    fn build(&mut self, config: EngineConfig) -> Result<(), BenchError> {
        self.calls.push(format!("build:{}", config.label()));
        if self.fail_build_for == Some(config) {
            self.state = Some(EngineState::NotBuilt);
            return Err(BenchError::Build(ErrorInfo::new("build-failed", "make failed")));
        }
        self.state = Some(EngineState::Built);
        Ok(())
    }

    fn start(&mut self) -> Result<(), BenchError> {
        self.calls.push("start".to_string());
        self.state = Some(EngineState::Running);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BenchError> {
        self.calls.push("stop".to_string());
        if self.current() == EngineState::Running {
            self.state = Some(EngineState::Stopped);
        }
        Ok(())
    }

    fn reconfigure(&mut self, config: EngineConfig) -> Result<(), BenchError> {
        if self.current() == EngineState::Running {
            return Err(BenchError::Lifecycle(ErrorInfo::new("engine-running", "running")));
        }
        self.calls.push(format!("reconfigure:{}", config.label()));
        Ok(())
    }

    fn state(&self) -> EngineState {
        self.current()
    }
}

/// Returns scripted results in order, then a fixed latency.
#[derive(Debug, Default)]
pub struct FakeRunner {
    pub scripts: Vec<String>,
    pub results: VecDeque<Result<u64, BenchError>>,
    pub default_us: u64,
    /// Trips after this many scripts have run.
    pub cancel_after: Option<(usize, qbench_core::CancelToken)>,
}

impl ScriptRunner for FakeRunner {
    fn run_script(&mut self, script: &CommandScript) -> Result<u64, BenchError> {
        self.scripts.push(script.render());
        if let Some((limit, token)) = &self.cancel_after {
            if self.scripts.len() >= *limit {
                token.cancel();
            }
        }
        self.results.pop_front().unwrap_or(Ok(self.default_us))
    }
}

pub fn timeout() -> BenchError {
    BenchError::Timeout(ErrorInfo::new("trial-timeout", "client hung"))
}
