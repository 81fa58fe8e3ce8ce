//! Engine process control and timed trial execution.
//!
//! [`EngineController`] owns the external engine process and is the only
//! component that changes its state. [`TrialExecutor`] runs one script through
//! the engine's client against whatever engine is currently up.

pub mod controller;
pub mod executor;
pub mod spec;

use qbench_core::{BenchError, EngineConfig};
use qbench_gen::CommandScript;

pub use controller::{EngineController, EngineState};
pub use executor::TrialExecutor;
pub use spec::{BuildParamStyle, EngineSpec};

/// Lifecycle operations the experiment driver may request.
///
/// Legal transitions: `build` enters `Built`, `start` enters `Running`, and
/// `stop` is the only way out of `Running`. `stop` on an engine that is not
/// running succeeds without doing anything.
pub trait EngineLifecycle {
    fn build(&mut self, config: EngineConfig) -> Result<(), BenchError>;
    fn start(&mut self) -> Result<(), BenchError>;
    fn stop(&mut self) -> Result<(), BenchError>;
    /// Only valid while the engine is not running.
    fn reconfigure(&mut self, config: EngineConfig) -> Result<(), BenchError>;
    fn state(&self) -> EngineState;
}

/// Runs one command script and returns its elapsed time in microseconds.
pub trait ScriptRunner {
    fn run_script(&mut self, script: &CommandScript) -> Result<u64, BenchError>;
}
