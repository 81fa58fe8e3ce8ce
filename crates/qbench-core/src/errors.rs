//! Structured error types shared across qbench crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`BenchError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, parameter values, exit codes).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the harness.
///
/// Trial-local failures ([`BenchError::Execution`], [`BenchError::Timeout`]) are
/// recorded against a single parameter point; every other family aborts the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum BenchError {
    /// A parameter cannot be realised as a valid command script or plan.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// The engine failed to compile.
    #[error("build error: {0}")]
    Build(ErrorInfo),
    /// The engine could not be launched or was not ready after settling.
    #[error("start error: {0}")]
    Start(ErrorInfo),
    /// A client invocation failed.
    #[error("execution error: {0}")]
    Execution(ErrorInfo),
    /// A client invocation exceeded its time bound.
    #[error("timeout: {0}")]
    Timeout(ErrorInfo),
    /// Result store read or write failure.
    #[error("persistence error: {0}")]
    Persistence(ErrorInfo),
    /// A named resource does not exist.
    #[error("not found: {0}")]
    NotFound(ErrorInfo),
    /// An operation was requested in an engine state that forbids it.
    #[error("lifecycle error: {0}")]
    Lifecycle(ErrorInfo),
    /// The sweep was cancelled between trials.
    #[error("cancelled: {0}")]
    Cancelled(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl BenchError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            BenchError::Configuration(info)
            | BenchError::Build(info)
            | BenchError::Start(info)
            | BenchError::Execution(info)
            | BenchError::Timeout(info)
            | BenchError::Persistence(info)
            | BenchError::NotFound(info)
            | BenchError::Lifecycle(info)
            | BenchError::Cancelled(info) => info,
        }
    }

    /// Short lowercase name of the error family.
    pub fn family(&self) -> &'static str {
        match self {
            BenchError::Configuration(_) => "configuration",
            BenchError::Build(_) => "build",
            BenchError::Start(_) => "start",
            BenchError::Execution(_) => "execution",
            BenchError::Timeout(_) => "timeout",
            BenchError::Persistence(_) => "persistence",
            BenchError::NotFound(_) => "not-found",
            BenchError::Lifecycle(_) => "lifecycle",
            BenchError::Cancelled(_) => "cancelled",
        }
    }

    /// True when the failure concerns one trial only and the sweep may continue.
    pub fn is_trial_local(&self) -> bool {
        matches!(self, BenchError::Execution(_) | BenchError::Timeout(_))
    }

    /// Shorthand for a [`BenchError::Configuration`] without context.
    pub fn configuration(code: &str, message: impl Into<String>) -> Self {
        BenchError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`BenchError::Persistence`] wrapping a lower level error.
    pub fn persistence(code: &str, err: impl Display) -> Self {
        BenchError::Persistence(ErrorInfo::new(code, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context_and_hint() {
        let err = BenchError::Build(
            ErrorInfo::new("engine-build", "make failed")
                .with_context("status", "2")
                .with_hint("see compile.out"),
        );
        let text = err.to_string();
        assert!(text.starts_with("build error: make failed (code: engine-build)"));
        assert!(text.contains("status=2"));
        assert!(text.ends_with("hint: see compile.out"));
    }

    #[test]
    fn only_execution_and_timeout_are_trial_local() {
        assert!(BenchError::Execution(ErrorInfo::new("x", "y")).is_trial_local());
        assert!(BenchError::Timeout(ErrorInfo::new("x", "y")).is_trial_local());
        assert!(!BenchError::Build(ErrorInfo::new("x", "y")).is_trial_local());
        assert!(!BenchError::configuration("x", "y").is_trial_local());
        assert!(!BenchError::Cancelled(ErrorInfo::new("x", "y")).is_trial_local());
    }
}
