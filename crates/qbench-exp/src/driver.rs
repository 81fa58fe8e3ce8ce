//! Runs an experiment plan against an engine and assembles its series.

use chrono::{SecondsFormat, Utc};
use qbench_core::errors::{BenchError, ErrorInfo};
use qbench_core::{CancelToken, EngineConfig, ParamPoint, ResultSeries};
use qbench_engine::{EngineLifecycle, ScriptRunner};
use qbench_gen::{CommandScript, JoinStrategy, WorkloadGenerator};
use tracing::{debug, info, warn};

use crate::hash::stable_hash_string;
use crate::plan::{data_size, integer_point, ExperimentFamily, ExperimentPlan};

/// Series produced by one plan plus the sweep-level failure summary.
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    pub series: Vec<ResultSeries>,
    /// Poisoned entries across every series.
    pub failed_trials: usize,
    pub cancelled: bool,
}

impl SweepOutcome {
    pub fn find(&self, name: &str) -> Option<&ResultSeries> {
        self.series.iter().find(|series| series.name() == name)
    }
}

/// Sweep orchestrator.
///
/// One trial runs at a time. For every configuration the engine is
/// reconfigured, rebuilt and started, the schema setup script is run, then
/// every sweep point is measured for every variant against that same engine
/// instance. The engine is stopped on every exit path.
pub struct Driver<E, X> {
    engine: E,
    runner: X,
    generator: WorkloadGenerator,
    cancel: CancelToken,
}

enum ConfigRun {
    Finished,
    Cancelled,
}

impl<E: EngineLifecycle, X: ScriptRunner> Driver<E, X> {
    pub fn new(engine: E, runner: X, generator: WorkloadGenerator) -> Self {
        Self {
            engine,
            runner,
            generator,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn runner(&self) -> &X {
        &self.runner
    }

    /// Runs every configuration of `plan`. Fatal errors are returned after
    /// the engine has been stopped; trial-local errors become poisoned entries.
    pub fn run_plan(&mut self, plan: &ExperimentPlan) -> Result<SweepOutcome, BenchError> {
        plan.validate()?;
        let points = plan.family.sweep().points()?;
        let plan_hash = stable_hash_string(plan)?;
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let replay = self.replay_scripts(plan, &points)?;
        info!(
            plan = %plan.name,
            family = plan.family.name(),
            points = points.len(),
            configs = plan.engine_configs().len(),
            "starting sweep"
        );

        let mut outcome = SweepOutcome::default();
        for config in plan.engine_configs() {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            let mut series: Vec<ResultSeries> = plan
                .variants()
                .iter()
                .map(|variant| {
                    ResultSeries::new(plan.series_name(variant, config), plan.family.name(), config)
                        .with_provenance(plan_hash.clone(), created_at.clone())
                })
                .collect();

            let run = self.run_config(plan, config, &points, replay.as_deref(), &mut series);
            let stopped = self.engine.stop();
            let run = match run {
                Ok(run) => run,
                Err(err) => {
                    if let Err(stop_err) = stopped {
                        warn!(code = %stop_err.info().code, "engine stop failed after fatal error");
                    }
                    warn!(plan = %plan.name, config = %config.label(), family = err.family(), "sweep aborted");
                    return Err(err);
                }
            };
            stopped?;

            let failed: usize = series.iter().map(ResultSeries::failed_count).sum();
            if failed > 0 {
                warn!(plan = %plan.name, config = %config.label(), failed, "trials failed");
            }
            outcome.failed_trials += failed;
            outcome.series.extend(series);
            if let ConfigRun::Cancelled = run {
                outcome.cancelled = true;
                break;
            }
        }
        info!(
            plan = %plan.name,
            series = outcome.series.len(),
            failed_trials = outcome.failed_trials,
            cancelled = outcome.cancelled,
            "sweep finished"
        );
        Ok(outcome)
    }

    fn run_config(
        &mut self,
        plan: &ExperimentPlan,
        config: EngineConfig,
        points: &[ParamPoint],
        replay: Option<&[CommandScript]>,
        series: &mut [ResultSeries],
    ) -> Result<ConfigRun, BenchError> {
        self.engine.reconfigure(config)?;
        self.engine.build(config)?;
        self.engine.start()?;

        let setup = plan.schema.setup_script()?;
        let setup_us = self.runner.run_script(&setup).map_err(|err| {
            BenchError::Start(
                ErrorInfo::new("setup-failed", "schema setup script failed")
                    .with_context("cause", err.to_string())
                    .with_context("config", config.label()),
            )
        })?;
        info!(config = %config.label(), setup_us, "setup complete");
        for entry in series.iter_mut() {
            entry.set_setup_us(setup_us);
        }

        for (idx, point) in points.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(config = %config.label(), point = %point, "sweep cancelled");
                for entry in series.iter_mut() {
                    entry.mark_cancelled();
                }
                return Ok(ConfigRun::Cancelled);
            }
            let scripts = match replay {
                Some(scripts) => vec![scripts[idx].clone()],
                None => self.scripts_for(plan, *point)?,
            };
            for (entry, script) in series.iter_mut().zip(&scripts) {
                match self.runner.run_script(script) {
                    Ok(elapsed_us) => {
                        debug!(series = entry.name(), point = %point, elapsed_us, "trial");
                        entry.record(*point, elapsed_us)?;
                    }
                    Err(err) if err.is_trial_local() => {
                        warn!(
                            series = entry.name(),
                            point = %point,
                            code = %err.info().code,
                            "trial failed"
                        );
                        entry.record_failure(*point, err)?;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(ConfigRun::Finished)
    }

    /// Threaded scans replay one pregenerated script per point under every
    /// configuration; other families generate fresh scripts per trial.
    fn replay_scripts(
        &mut self,
        plan: &ExperimentPlan,
        points: &[ParamPoint],
    ) -> Result<Option<Vec<CommandScript>>, BenchError> {
        let ExperimentFamily::ThreadedScan { bands, column, .. } = &plan.family else {
            return Ok(None);
        };
        let column = plan.schema.column_at(*column)?;
        let mut scripts = Vec::with_capacity(points.len());
        for point in points {
            let queries = integer_point(*point)?;
            scripts.push(self.generator.shared_scan(&column, queries, bands)?.second);
        }
        Ok(Some(scripts))
    }

    /// Scripts for one point, aligned with [`ExperimentPlan::variants`].
    fn scripts_for(
        &mut self,
        plan: &ExperimentPlan,
        point: ParamPoint,
    ) -> Result<Vec<CommandScript>, BenchError> {
        let schema = &plan.schema;
        match &plan.family {
            ExperimentFamily::SharedScan { bands, column, .. }
            | ExperimentFamily::ThreadedScan { bands, column, .. } => {
                let pair = self.generator.shared_scan(
                    &schema.column_at(*column)?,
                    integer_point(point)?,
                    bands,
                )?;
                Ok(vec![pair.first, pair.second])
            }
            ExperimentFamily::Selectivity {
                pass_num,
                column,
                domain,
                ..
            } => Ok(vec![self.generator.selectivity_scan(
                &schema.column_at(*column)?,
                point.as_f64(),
                *pass_num,
                domain,
            )?]),
            ExperimentFamily::Join {
                query_num,
                layout,
                strategies,
                left_column,
                right_column,
                domain,
                ..
            } => {
                let size = data_size(point)?;
                let pair = self.generator.join_pair(
                    &schema.column_at(*left_column)?,
                    &schema.column_at(*right_column)?,
                    size,
                    *query_num,
                    domain,
                    *layout,
                )?;
                Ok(strategies
                    .iter()
                    .map(|strategy| match strategy {
                        JoinStrategy::NestedLoop => pair.first.clone(),
                        JoinStrategy::Hash => pair.second.clone(),
                    })
                    .collect())
            }
            ExperimentFamily::Insert { domain, .. } => Ok(vec![self.generator.inserts(
                &schema.table_ref(),
                integer_point(point)?,
                schema.columns.len(),
                domain,
            )?]),
        }
    }
}
