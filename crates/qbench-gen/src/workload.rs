//! Script builders for each experiment family.

use qbench_core::errors::{BenchError, ErrorInfo};
use qbench_core::RngHandle;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::interval::{fixed_width_interval, selectivity_interval, ScanBands, ValueDomain};
use crate::script::CommandScript;
use crate::statement::{JoinStrategy, Statement};

/// How the select/fetch inputs of a join workload are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinLayout {
    /// One select/fetch block feeding `query_num` joins over the same window.
    #[default]
    SharedSetup,
    /// A fresh window with its own select/fetch block before every join.
    PerQuery,
}

/// Two scripts over query-for-query identical inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPair {
    pub first: CommandScript,
    pub second: CommandScript,
}

/// Generates command scripts from numeric parameters.
///
/// All draws come from the owned [`RngHandle`]; it is never reseeded, so two
/// calls with the same parameters produce different scripts unless the caller
/// rebuilds the generator from the same seed.
#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    rng: RngHandle,
}

impl WorkloadGenerator {
    pub fn new(rng: RngHandle) -> Self {
        Self { rng }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(RngHandle::from_seed(seed))
    }

    /// `queries` banded scans emitted as independent statements (`first`) and
    /// wrapped in `batch_queries()`/`batch_execute()` (`second`).
    pub fn shared_scan(
        &mut self,
        column: &str,
        queries: usize,
        bands: &ScanBands,
    ) -> Result<ScriptPair, BenchError> {
        ensure_positive("queries", queries)?;
        bands.validate()?;
        let mut selects = Vec::with_capacity(queries);
        for idx in 0..queries {
            let (low, high) = bands.draw(&mut self.rng)?;
            selects.push(Statement::Select {
                handle: format!("s{idx}"),
                column: column.to_string(),
                low,
                high,
            });
        }
        let mut batched = Vec::with_capacity(queries + 2);
        batched.push(Statement::BatchQueries);
        batched.extend(selects.iter().cloned());
        batched.push(Statement::BatchExecute);
        debug!(queries, column, "generated shared scan pair");
        Ok(ScriptPair {
            first: CommandScript::new(selects),
            second: CommandScript::new(batched),
        })
    }

    /// `pass_num` selects on `column`, each spanning `selectivity` of `domain`.
    pub fn selectivity_scan(
        &mut self,
        column: &str,
        selectivity: f64,
        pass_num: usize,
        domain: &ValueDomain,
    ) -> Result<CommandScript, BenchError> {
        ensure_positive("pass_num", pass_num)?;
        let mut statements = Vec::with_capacity(pass_num);
        for idx in 0..pass_num {
            let (low, high) = selectivity_interval(selectivity, domain, &mut self.rng)?;
            statements.push(Statement::Select {
                handle: format!("s{idx}"),
                column: column.to_string(),
                low,
                high,
            });
        }
        debug!(selectivity, pass_num, column, "generated selectivity scan");
        Ok(CommandScript::new(statements))
    }

    /// Nested-loop (`first`) and hash (`second`) join scripts over the same
    /// data-size windows. The setup statements are identical; only the join
    /// operator token differs.
    pub fn join_pair(
        &mut self,
        left_column: &str,
        right_column: &str,
        size: i64,
        query_num: usize,
        domain: &ValueDomain,
        layout: JoinLayout,
    ) -> Result<ScriptPair, BenchError> {
        ensure_positive("query_num", query_num)?;
        let template = match layout {
            JoinLayout::SharedSetup => {
                let window = fixed_width_interval(size, domain, &mut self.rng)?;
                let mut lines = join_inputs("", left_column, right_column, window);
                for idx in 0..query_num {
                    lines.push(join_statement(&idx.to_string(), ""));
                }
                lines
            }
            JoinLayout::PerQuery => {
                let mut lines = Vec::with_capacity(query_num * 5);
                for idx in 0..query_num {
                    let window = fixed_width_interval(size, domain, &mut self.rng)?;
                    let suffix = idx.to_string();
                    lines.extend(join_inputs(&suffix, left_column, right_column, window));
                    lines.push(join_statement(&suffix, &suffix));
                }
                lines
            }
        };
        debug!(size, query_num, ?layout, "generated join pair");
        Ok(ScriptPair {
            first: with_strategy(&template, JoinStrategy::NestedLoop),
            second: with_strategy(&template, JoinStrategy::Hash),
        })
    }

    /// `count` relational inserts of `arity` independent uniform values drawn
    /// from `[min, max)`. No other statement kind is emitted.
    pub fn inserts(
        &mut self,
        table: &str,
        count: usize,
        arity: usize,
        domain: &ValueDomain,
    ) -> Result<CommandScript, BenchError> {
        ensure_positive("count", count)?;
        ensure_positive("arity", arity)?;
        domain.validate()?;
        let statements = (0..count)
            .map(|_| Statement::RelationalInsert {
                table: table.to_string(),
                values: (0..arity)
                    .map(|_| self.rng.gen_range(domain.min..domain.max))
                    .collect(),
            })
            .collect::<Vec<_>>();
        debug!(count, table, "generated insert script");
        Ok(CommandScript::new(statements))
    }
}

fn ensure_positive(name: &str, value: usize) -> Result<(), BenchError> {
    if value == 0 {
        return Err(BenchError::Configuration(
            ErrorInfo::new("workload-empty", "workload parameter must be positive")
                .with_context("parameter", name),
        ));
    }
    Ok(())
}

fn join_inputs(suffix: &str, left: &str, right: &str, (low, high): (i64, i64)) -> Vec<Statement> {
    vec![
        Statement::Select {
            handle: format!("s1{suffix}"),
            column: left.to_string(),
            low,
            high,
        },
        Statement::Select {
            handle: format!("s2{suffix}"),
            column: right.to_string(),
            low,
            high,
        },
        Statement::Fetch {
            handle: format!("f1{suffix}"),
            column: left.to_string(),
            positions: format!("s1{suffix}"),
        },
        Statement::Fetch {
            handle: format!("f2{suffix}"),
            column: right.to_string(),
            positions: format!("s2{suffix}"),
        },
    ]
}

// Placeholder strategy; `with_strategy` rewrites it per variant.
fn join_statement(result_suffix: &str, input_suffix: &str) -> Statement {
    Statement::Join {
        left: format!("p1{result_suffix}"),
        right: format!("p2{result_suffix}"),
        left_values: format!("f1{input_suffix}"),
        left_positions: format!("s1{input_suffix}"),
        right_values: format!("f2{input_suffix}"),
        right_positions: format!("s2{input_suffix}"),
        strategy: JoinStrategy::NestedLoop,
    }
}

fn with_strategy(template: &[Statement], target: JoinStrategy) -> CommandScript {
    template
        .iter()
        .cloned()
        .map(|statement| match statement {
            Statement::Join {
                left,
                right,
                left_values,
                left_positions,
                right_values,
                right_positions,
                ..
            } => Statement::Join {
                left,
                right,
                left_values,
                left_positions,
                right_values,
                right_positions,
                strategy: target,
            },
            other => other,
        })
        .collect()
}
