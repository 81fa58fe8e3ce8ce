//! Sweep definitions and per-family experiment plans.

use std::collections::BTreeSet;

use qbench_core::errors::{BenchError, ErrorInfo};
use qbench_core::{EngineConfig, ParamPoint};
use qbench_gen::{
    ensure_window_fits, realizable_span, JoinLayout, JoinStrategy, ScanBands, SchemaSpec,
    ValueDomain,
};
use serde::{Deserialize, Serialize};

/// Deterministic generator of the parameter points of one sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SweepSpec {
    /// `start, start + step, ...` strictly below `stop`.
    Range { start: u64, stop: u64, step: u64 },
    /// `i / (count / scale)` for `i in 0..count`.
    Fractions { count: usize, scale: f64 },
    /// `floor(i * ceiling / trials)` for `i in 1..trials`.
    DataSizes { trials: u64, ceiling: u64 },
    /// Explicit points in the given order.
    Values { values: Vec<ParamPoint> },
}

impl SweepSpec {
    /// Points in sweep order. Empty or duplicate-producing sweeps are rejected.
    pub fn points(&self) -> Result<Vec<ParamPoint>, BenchError> {
        let points: Vec<ParamPoint> = match self {
            SweepSpec::Range { start, stop, step } => {
                if *step == 0 {
                    return Err(sweep_error("sweep-step-zero", "range step must be positive", self));
                }
                (*start..*stop)
                    .step_by(*step as usize)
                    .map(ParamPoint::Int)
                    .collect()
            }
            SweepSpec::Fractions { count, scale } => {
                if !scale.is_finite() || *scale <= 0.0 || *scale > 1.0 {
                    return Err(sweep_error("sweep-scale", "fraction scale must lie in (0, 1]", self));
                }
                let denominator = *count as f64 / scale;
                (0..*count)
                    .map(|idx| ParamPoint::Real(idx as f64 / denominator))
                    .collect()
            }
            SweepSpec::DataSizes { trials, ceiling } => (1..*trials)
                .map(|idx| ParamPoint::Int(idx * ceiling / trials))
                .collect(),
            SweepSpec::Values { values } => values.clone(),
        };
        if points.is_empty() {
            return Err(sweep_error("sweep-empty", "sweep produces no points", self));
        }
        let mut seen = BTreeSet::new();
        for point in &points {
            if !seen.insert(point.key()) {
                return Err(BenchError::Configuration(
                    ErrorInfo::new("sweep-duplicate-point", "sweep produces a point twice")
                        .with_context("point", point.key()),
                ));
            }
        }
        Ok(points)
    }
}

fn sweep_error(code: &str, message: &str, sweep: &SweepSpec) -> BenchError {
    BenchError::Configuration(ErrorInfo::new(code, message).with_context("sweep", format!("{sweep:?}")))
}

fn default_scan_sweep() -> SweepSpec {
    SweepSpec::Range {
        start: 1,
        stop: 100,
        step: 5,
    }
}

fn default_selectivity_sweep() -> SweepSpec {
    SweepSpec::Fractions {
        count: 160,
        scale: 0.8,
    }
}

fn default_join_sweep() -> SweepSpec {
    SweepSpec::DataSizes {
        trials: 100,
        ceiling: 10_000,
    }
}

fn default_insert_sweep() -> SweepSpec {
    SweepSpec::Range {
        start: 1,
        stop: 200,
        step: 5,
    }
}

const fn default_pass_num() -> usize {
    100
}

const fn default_query_num() -> usize {
    100
}

const fn default_selectivity_column() -> usize {
    1
}

const fn default_right_column() -> usize {
    1
}

fn default_selectivity_domain() -> ValueDomain {
    ValueDomain::SELECTIVITY
}

fn default_strategies() -> Vec<JoinStrategy> {
    JoinStrategy::ALL.to_vec()
}

/// Experiment family together with its numeric parameters.
///
/// Column fields are positions into the plan's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExperimentFamily {
    /// Independent vs batched scans over the same predicate ranges.
    SharedScan {
        #[serde(default = "default_scan_sweep")]
        sweep: SweepSpec,
        #[serde(default)]
        bands: ScanBands,
        #[serde(default)]
        column: usize,
    },
    /// Batched scans generated once and replayed under every configuration.
    ThreadedScan {
        #[serde(default = "default_scan_sweep")]
        sweep: SweepSpec,
        #[serde(default)]
        bands: ScanBands,
        #[serde(default)]
        column: usize,
    },
    Selectivity {
        #[serde(default = "default_selectivity_sweep")]
        sweep: SweepSpec,
        #[serde(default = "default_pass_num")]
        pass_num: usize,
        #[serde(default = "default_selectivity_column")]
        column: usize,
        #[serde(default = "default_selectivity_domain")]
        domain: ValueDomain,
    },
    Join {
        #[serde(default = "default_join_sweep")]
        sweep: SweepSpec,
        #[serde(default = "default_query_num")]
        query_num: usize,
        #[serde(default)]
        layout: JoinLayout,
        #[serde(default = "default_strategies")]
        strategies: Vec<JoinStrategy>,
        #[serde(default)]
        left_column: usize,
        #[serde(default = "default_right_column")]
        right_column: usize,
        #[serde(default = "default_selectivity_domain")]
        domain: ValueDomain,
    },
    Insert {
        #[serde(default = "default_insert_sweep")]
        sweep: SweepSpec,
        #[serde(default = "default_selectivity_domain")]
        domain: ValueDomain,
    },
}

impl ExperimentFamily {
    /// Shared scan with every parameter defaulted.
    pub fn shared_scan() -> Self {
        ExperimentFamily::SharedScan {
            sweep: default_scan_sweep(),
            bands: ScanBands::default(),
            column: 0,
        }
    }

    pub fn threaded_scan() -> Self {
        ExperimentFamily::ThreadedScan {
            sweep: default_scan_sweep(),
            bands: ScanBands::default(),
            column: 0,
        }
    }

    pub fn selectivity() -> Self {
        ExperimentFamily::Selectivity {
            sweep: default_selectivity_sweep(),
            pass_num: default_pass_num(),
            column: default_selectivity_column(),
            domain: default_selectivity_domain(),
        }
    }

    pub fn join() -> Self {
        ExperimentFamily::Join {
            sweep: default_join_sweep(),
            query_num: default_query_num(),
            layout: JoinLayout::default(),
            strategies: default_strategies(),
            left_column: 0,
            right_column: default_right_column(),
            domain: default_selectivity_domain(),
        }
    }

    pub fn insert() -> Self {
        ExperimentFamily::Insert {
            sweep: default_insert_sweep(),
            domain: default_selectivity_domain(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExperimentFamily::SharedScan { .. } => "shared-scan",
            ExperimentFamily::ThreadedScan { .. } => "threaded-scan",
            ExperimentFamily::Selectivity { .. } => "selectivity",
            ExperimentFamily::Join { .. } => "join",
            ExperimentFamily::Insert { .. } => "insert",
        }
    }

    pub fn sweep(&self) -> &SweepSpec {
        match self {
            ExperimentFamily::SharedScan { sweep, .. }
            | ExperimentFamily::ThreadedScan { sweep, .. }
            | ExperimentFamily::Selectivity { sweep, .. }
            | ExperimentFamily::Join { sweep, .. }
            | ExperimentFamily::Insert { sweep, .. } => sweep,
        }
    }

    /// Replaces the sweep, keeping every other parameter.
    pub fn with_sweep(mut self, replacement: SweepSpec) -> Self {
        match &mut self {
            ExperimentFamily::SharedScan { sweep, .. }
            | ExperimentFamily::ThreadedScan { sweep, .. }
            | ExperimentFamily::Selectivity { sweep, .. }
            | ExperimentFamily::Join { sweep, .. }
            | ExperimentFamily::Insert { sweep, .. } => *sweep = replacement,
        }
        self
    }

    fn default_configs(&self) -> Vec<EngineConfig> {
        match self {
            ExperimentFamily::ThreadedScan { .. } => {
                (2..=4).map(EngineConfig::threaded).collect()
            }
            _ => vec![EngineConfig::single_threaded()],
        }
    }
}

/// One named experiment: family, schema and the configurations to sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentPlan {
    pub name: String,
    pub family: ExperimentFamily,
    pub schema: SchemaSpec,
    /// Engine configurations, one series set each. Empty means the family default.
    #[serde(default)]
    pub configs: Vec<EngineConfig>,
}

impl ExperimentPlan {
    pub fn new(name: impl Into<String>, family: ExperimentFamily, schema: SchemaSpec) -> Self {
        Self {
            name: name.into(),
            family,
            schema,
            configs: Vec::new(),
        }
    }

    pub fn with_configs(mut self, configs: Vec<EngineConfig>) -> Self {
        self.configs = configs;
        self
    }

    pub fn engine_configs(&self) -> Vec<EngineConfig> {
        if self.configs.is_empty() {
            self.family.default_configs()
        } else {
            self.configs.clone()
        }
    }

    /// Series variants produced per configuration, in script order.
    pub fn variants(&self) -> Vec<String> {
        match &self.family {
            ExperimentFamily::SharedScan { .. } => {
                vec!["independent".to_string(), "shared".to_string()]
            }
            ExperimentFamily::ThreadedScan { .. } => vec!["shared".to_string()],
            ExperimentFamily::Selectivity { .. } | ExperimentFamily::Insert { .. } => {
                vec![self.schema.index_label()]
            }
            ExperimentFamily::Join { strategies, .. } => strategies
                .iter()
                .map(|strategy| strategy.token().to_string())
                .collect(),
        }
    }

    /// `plan/variant/config`
    pub fn series_name(&self, variant: &str, config: EngineConfig) -> String {
        format!("{}/{}/{}", self.name, variant, config.label())
    }

    /// Checks everything that can be checked without running the engine.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.name.trim().is_empty() {
            return Err(BenchError::configuration("plan-name-empty", "plan name must not be empty"));
        }
        self.schema.validate()?;
        let points = self.family.sweep().points()?;
        for config in self.engine_configs() {
            config.validate()?;
        }
        let mut labels = BTreeSet::new();
        for config in self.engine_configs() {
            if !labels.insert(config.label()) {
                return Err(BenchError::Configuration(
                    ErrorInfo::new("plan-duplicate-config", "configuration listed twice")
                        .with_context("plan", self.name.clone())
                        .with_context("config", config.label()),
                ));
            }
        }
        match &self.family {
            ExperimentFamily::SharedScan { bands, column, .. }
            | ExperimentFamily::ThreadedScan { bands, column, .. } => {
                bands.validate()?;
                self.schema.column_at(*column)?;
            }
            ExperimentFamily::Selectivity {
                pass_num,
                column,
                domain,
                ..
            } => {
                positive("pass_num", *pass_num)?;
                domain.validate()?;
                self.schema.column_at(*column)?;
            }
            ExperimentFamily::Join {
                query_num,
                strategies,
                left_column,
                right_column,
                domain,
                ..
            } => {
                positive("query_num", *query_num)?;
                positive("strategies", strategies.len())?;
                let distinct: BTreeSet<_> = strategies.iter().map(|s| s.token()).collect();
                if distinct.len() != strategies.len() {
                    return Err(BenchError::configuration(
                        "plan-duplicate-strategy",
                        "join strategy listed twice",
                    ));
                }
                domain.validate()?;
                self.schema.column_at(*left_column)?;
                self.schema.column_at(*right_column)?;
            }
            ExperimentFamily::Insert { domain, .. } => domain.validate()?,
        }
        for point in &points {
            self.validate_point(*point).map_err(|err| match err {
                BenchError::Configuration(info) => {
                    BenchError::Configuration(info.with_context("plan", self.name.clone()))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// A point is valid when the family can build a script for it.
    fn validate_point(&self, point: ParamPoint) -> Result<(), BenchError> {
        match &self.family {
            ExperimentFamily::SharedScan { .. } | ExperimentFamily::ThreadedScan { .. } => {
                positive("queries", integer_point(point)?)
            }
            ExperimentFamily::Selectivity { domain, .. } => {
                realizable_span(point.as_f64(), domain).map(|_| ())
            }
            ExperimentFamily::Join { domain, .. } => ensure_window_fits(data_size(point)?, domain),
            ExperimentFamily::Insert { .. } => positive("count", integer_point(point)?),
        }
    }
}

/// Integer families read their points as counts.
pub(crate) fn integer_point(point: ParamPoint) -> Result<usize, BenchError> {
    point
        .as_u64()
        .and_then(|value| usize::try_from(value).ok())
        .ok_or_else(|| {
            BenchError::Configuration(
                ErrorInfo::new("sweep-point-kind", "family expects integer sweep points")
                    .with_context("point", point.key()),
            )
        })
}

pub(crate) fn data_size(point: ParamPoint) -> Result<i64, BenchError> {
    i64::try_from(integer_point(point)?).map_err(|_| {
        BenchError::Configuration(
            ErrorInfo::new("sweep-point-range", "data size does not fit i64")
                .with_context("point", point.key()),
        )
    })
}

fn positive(name: &str, value: usize) -> Result<(), BenchError> {
    if value == 0 {
        return Err(BenchError::Configuration(
            ErrorInfo::new("plan-parameter-zero", "parameter must be positive")
                .with_context("parameter", name),
        ));
    }
    Ok(())
}
