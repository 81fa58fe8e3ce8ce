//! Parameter points, trial outcomes and ordered result series.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::errors::{BenchError, ErrorInfo};

/// Scalar indexing one trial of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamPoint {
    /// Counts, sizes and thread numbers.
    Int(u64),
    /// Fractions such as selectivity targets.
    Real(f64),
}

impl ParamPoint {
    /// Canonical textual key; two points with the same key are the same point.
    pub fn key(&self) -> String {
        match self {
            ParamPoint::Int(value) => value.to_string(),
            ParamPoint::Real(value) => format!("{value}"),
        }
    }

    /// Numeric value as `f64`, used for ordering checks and reporting.
    pub fn as_f64(&self) -> f64 {
        match self {
            ParamPoint::Int(value) => *value as f64,
            ParamPoint::Real(value) => *value,
        }
    }

    /// Integer value, when the point carries one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ParamPoint::Int(value) => Some(*value),
            ParamPoint::Real(_) => None,
        }
    }
}

impl Display for ParamPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<u64> for ParamPoint {
    fn from(value: u64) -> Self {
        ParamPoint::Int(value)
    }
}

impl From<f64> for ParamPoint {
    fn from(value: f64) -> Self {
        ParamPoint::Real(value)
    }
}

/// Result of one trial, produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TrialOutcome {
    /// The client exited successfully after `elapsed_us` microseconds.
    Completed { elapsed_us: u64 },
    /// The trial failed; the point is kept as a poisoned entry.
    Failed { error: BenchError },
}

impl TrialOutcome {
    /// Elapsed microseconds for completed trials.
    pub fn elapsed_us(&self) -> Option<u64> {
        match self {
            TrialOutcome::Completed { elapsed_us } => Some(*elapsed_us),
            TrialOutcome::Failed { .. } => None,
        }
    }

    /// True for poisoned entries.
    pub fn is_failed(&self) -> bool {
        matches!(self, TrialOutcome::Failed { .. })
    }
}

/// One `(point, outcome)` pair of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesEntry {
    /// Swept parameter value.
    pub point: ParamPoint,
    /// What the trial produced.
    pub outcome: TrialOutcome,
}

/// Ordered mapping from parameter point to trial outcome.
///
/// Insertion order is sweep order. Keys are unique: appending a point that is
/// already present is rejected and leaves the series untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSeries {
    name: String,
    family: String,
    config: EngineConfig,
    #[serde(default)]
    plan_hash: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    setup_us: Option<u64>,
    #[serde(default)]
    cancelled: bool,
    #[serde(default)]
    entries: Vec<SeriesEntry>,
}

impl ResultSeries {
    /// Creates an empty series for one experiment family and configuration.
    pub fn new(name: impl Into<String>, family: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            name: name.into(),
            family: family.into(),
            config,
            plan_hash: String::new(),
            created_at: String::new(),
            setup_us: None,
            cancelled: false,
            entries: Vec::new(),
        }
    }

    /// Attaches the plan hash and creation timestamp.
    pub fn with_provenance(mut self, plan_hash: impl Into<String>, created_at: impl Into<String>) -> Self {
        self.plan_hash = plan_hash.into();
        self.created_at = created_at.into();
        self
    }

    /// Store key, `plan/variant/config`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Experiment family that produced the series.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Engine configuration every trial ran under.
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Hex SHA-256 of the canonical plan; empty when not recorded.
    pub fn plan_hash(&self) -> &str {
        &self.plan_hash
    }

    /// RFC 3339 timestamp of the sweep start.
    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    /// Latency of the schema/load script run before the sweep, if recorded.
    pub fn setup_us(&self) -> Option<u64> {
        self.setup_us
    }

    /// Records the setup script latency.
    pub fn set_setup_us(&mut self, setup_us: u64) {
        self.setup_us = Some(setup_us);
    }

    /// True when the sweep producing this series was cut short.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Flags the series as the partial result of a cancelled sweep.
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Number of entries, failed ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no trial has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in sweep order.
    pub fn entries(&self) -> &[SeriesEntry] {
        &self.entries
    }

    /// Points in sweep order.
    pub fn points(&self) -> impl Iterator<Item = ParamPoint> + '_ {
        self.entries.iter().map(|entry| entry.point)
    }

    /// Appends an outcome, rejecting duplicate points.
    pub fn append(&mut self, point: ParamPoint, outcome: TrialOutcome) -> Result<(), BenchError> {
        let key = point.key();
        if self.entries.iter().any(|entry| entry.point.key() == key) {
            return Err(BenchError::Configuration(
                ErrorInfo::new(
                    "series-duplicate-point",
                    "parameter point already present in series",
                )
                .with_context("series", self.name.clone())
                .with_context("point", key),
            ));
        }
        self.entries.push(SeriesEntry { point, outcome });
        Ok(())
    }

    /// Appends a completed trial.
    pub fn record(&mut self, point: ParamPoint, elapsed_us: u64) -> Result<(), BenchError> {
        self.append(point, TrialOutcome::Completed { elapsed_us })
    }

    /// Appends a failed trial.
    pub fn record_failure(&mut self, point: ParamPoint, error: BenchError) -> Result<(), BenchError> {
        self.append(point, TrialOutcome::Failed { error })
    }

    /// Looks up the outcome recorded for a point.
    pub fn get(&self, point: &ParamPoint) -> Option<&TrialOutcome> {
        let key = point.key();
        self.entries
            .iter()
            .find(|entry| entry.point.key() == key)
            .map(|entry| &entry.outcome)
    }

    /// Completed `(point, elapsed_us)` pairs in sweep order.
    pub fn completed(&self) -> impl Iterator<Item = (ParamPoint, u64)> + '_ {
        self.entries
            .iter()
            .filter_map(|entry| entry.outcome.elapsed_us().map(|us| (entry.point, us)))
    }

    /// Number of poisoned entries.
    pub fn failed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome.is_failed())
            .count()
    }

    /// Key to latency mapping over completed trials.
    pub fn latency_map(&self) -> BTreeMap<String, u64> {
        self.completed()
            .map(|(point, us)| (point.key(), us))
            .collect()
    }

    /// Key to outcome mapping over every entry, independent of order.
    pub fn outcome_map(&self) -> BTreeMap<String, TrialOutcome> {
        self.entries
            .iter()
            .map(|entry| (entry.point.key(), entry.outcome.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_points_are_rejected() {
        let mut series = ResultSeries::new("scan", "selectivity", EngineConfig::default());
        series.record(ParamPoint::Real(0.25), 120).unwrap();
        let err = series.record(ParamPoint::Real(0.25), 99).unwrap_err();
        assert_eq!(err.info().code, "series-duplicate-point");
        assert_eq!(series.len(), 1);
        assert_eq!(
            series.get(&ParamPoint::Real(0.25)).and_then(TrialOutcome::elapsed_us),
            Some(120)
        );
    }

    #[test]
    fn failures_are_counted_but_not_mapped() {
        let mut series = ResultSeries::new("ins", "insert", EngineConfig::default());
        series.record(ParamPoint::Int(1), 10).unwrap();
        series
            .record_failure(
                ParamPoint::Int(6),
                BenchError::Timeout(ErrorInfo::new("trial-timeout", "too slow")),
            )
            .unwrap();
        assert_eq!(series.failed_count(), 1);
        assert_eq!(series.latency_map().len(), 1);
        assert_eq!(series.outcome_map().len(), 2);
    }

    #[test]
    fn untagged_points_keep_their_kind_through_json() {
        let points = vec![ParamPoint::Int(5), ParamPoint::Real(0.005), ParamPoint::Real(1.0)];
        let json = serde_json::to_string(&points).unwrap();
        let back: Vec<ParamPoint> = serde_json::from_str(&json).unwrap();
        assert_eq!(points, back);
    }
}
