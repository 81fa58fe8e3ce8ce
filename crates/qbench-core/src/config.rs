//! Engine configuration values that affect a sweep.

use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, ErrorInfo};

/// Build-time settings of the engine under test.
///
/// The value is consumed by the build step as named build parameters; it is
/// never patched into the engine's sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether the engine's batched scans run on worker threads.
    #[serde(default)]
    pub multithreading: bool,
    /// Number of worker threads used when multithreading is enabled.
    #[serde(default = "EngineConfig::default_thread_count")]
    pub thread_count: u32,
}

impl EngineConfig {
    /// Build parameter name toggling multithreading.
    pub const MULTI_THREADING_PARAM: &'static str = "MULTI_THREADING";
    /// Build parameter name carrying the thread count.
    pub const THREAD_NUM_PARAM: &'static str = "THREAD_NUM";

    const fn default_thread_count() -> u32 {
        4
    }

    /// Single-threaded configuration.
    pub const fn single_threaded() -> Self {
        Self {
            multithreading: false,
            thread_count: Self::default_thread_count(),
        }
    }

    /// Multithreaded configuration with `threads` workers.
    pub const fn threaded(threads: u32) -> Self {
        Self {
            multithreading: true,
            thread_count: threads,
        }
    }

    /// Rejects configurations the engine cannot be built with.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.thread_count == 0 {
            return Err(BenchError::Configuration(
                ErrorInfo::new("engine-thread-count", "thread count must be at least 1")
                    .with_context("thread_count", "0"),
            ));
        }
        Ok(())
    }

    /// Ordered `(name, value)` build parameters.
    pub fn build_params(&self) -> Vec<(String, String)> {
        vec![
            (
                Self::MULTI_THREADING_PARAM.to_string(),
                u8::from(self.multithreading).to_string(),
            ),
            (
                Self::THREAD_NUM_PARAM.to_string(),
                self.thread_count.to_string(),
            ),
        ]
    }

    /// Short label used in series names, `st` or `mt<threads>`.
    pub fn label(&self) -> String {
        if self.multithreading {
            format!("mt{}", self.thread_count)
        } else {
            "st".to_string()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::single_threaded()
    }
}
