//! YAML harness configuration.

use std::fs;
use std::path::{Path, PathBuf};

use qbench_core::errors::{BenchError, ErrorInfo};
use qbench_engine::EngineSpec;
use qbench_exp::ExperimentPlan;
use serde::{Deserialize, Serialize};

/// Everything one `qbench run` needs: the engine checkout, where results go,
/// an optional master seed and the experiments to sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub engine: EngineSpec,
    #[serde(default = "HarnessConfig::default_store")]
    pub store: PathBuf,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub experiments: Vec<ExperimentPlan>,
}

impl HarnessConfig {
    fn default_store() -> PathBuf {
        PathBuf::from("results")
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, BenchError> {
        let config: HarnessConfig = serde_yaml::from_str(text).map_err(|err| {
            BenchError::Configuration(
                ErrorInfo::new("config-parse", "failed to parse harness configuration")
                    .with_hint(err.to_string()),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, BenchError> {
        let text = fs::read_to_string(path).map_err(|err| {
            BenchError::Configuration(
                ErrorInfo::new("config-read", "failed to read harness configuration")
                    .with_context("path", path.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        self.engine.validate()?;
        let mut names = std::collections::BTreeSet::new();
        for plan in &self.experiments {
            if !names.insert(plan.name.as_str()) {
                return Err(BenchError::Configuration(
                    ErrorInfo::new("config-duplicate-plan", "experiment name used twice")
                        .with_context("plan", plan.name.clone()),
                ));
            }
            plan.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbench_exp::{ExperimentFamily, SweepSpec};
    use qbench_gen::{Clustering, IndexKind};

    const SAMPLE: &str = r#"
engine:
  source_dir: /srv/engine/src
  settle_ms: 1000
  graceful_shutdown: true
store: out/results.sqlite
seed: 2019
experiments:
  - name: selectivity-btree
    family:
      kind: selectivity
      pass_num: 100
    schema:
      table: tbl1
      columns: [col1, col2]
      data_file: /data/data_for_selectivity.csv
      indexes:
        - { column: col2, kind: btree, clustering: clustered }
  - name: threads
    family:
      kind: threaded-scan
      sweep: { kind: range, start: 1, stop: 50, step: 5 }
    schema:
      table: tbl3_batch
      columns: [col1, col2, col3, col4]
      data_file: /data/data3_batch.csv
    configs:
      - { multithreading: true, thread_count: 2 }
      - { multithreading: true, thread_count: 4 }
"#;

    #[test]
    fn sample_config_parses_with_defaults() {
        let config = HarnessConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.engine.source_dir, PathBuf::from("/srv/engine/src"));
        assert!(config.engine.graceful_shutdown);
        assert_eq!(config.engine.client_command, vec!["./client".to_string()]);
        assert_eq!(config.seed, Some(2019));
        assert_eq!(config.experiments.len(), 2);

        let selectivity = &config.experiments[0];
        assert_eq!(selectivity.schema.database, "db1");
        assert_eq!(selectivity.schema.indexes[0].kind, IndexKind::Btree);
        assert_eq!(selectivity.schema.indexes[0].clustering, Clustering::Clustered);
        assert_eq!(selectivity.variants(), ["btree-clustered"]);
        assert_eq!(selectivity.family.sweep().points().unwrap().len(), 160);

        let threads = &config.experiments[1];
        assert!(matches!(threads.family, ExperimentFamily::ThreadedScan { .. }));
        assert_eq!(
            threads.family.sweep(),
            &SweepSpec::Range { start: 1, stop: 50, step: 5 }
        );
        assert_eq!(threads.engine_configs().len(), 2);
    }

    #[test]
    fn shipped_example_config_is_valid() {
        let text = include_str!("../../../configs/experiments.yaml");
        let config = HarnessConfig::from_yaml_str(text).unwrap();
        assert_eq!(config.experiments.len(), 6);
        assert_eq!(config.experiments[5].variants(), ["btree-unclustered+btree-unclustered"]);
    }

    #[test]
    fn duplicate_plan_names_are_rejected() {
        let text = r#"
experiments:
  - name: a
    family: { kind: insert }
    schema: { table: tbl1, columns: [col1, col2], data_file: d.csv }
  - name: a
    family: { kind: insert }
    schema: { table: tbl1, columns: [col1, col2], data_file: d.csv }
"#;
        let err = HarnessConfig::from_yaml_str(text).unwrap_err();
        assert_eq!(err.info().code, "config-duplicate-plan");
    }

    #[test]
    fn load_reads_from_disk() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = HarnessConfig::load(file.path()).unwrap();
        assert_eq!(config.store, PathBuf::from("out/results.sqlite"));

        let missing = HarnessConfig::load(Path::new("/nonexistent/qbench.yaml")).unwrap_err();
        assert_eq!(missing.info().code, "config-read");
    }

    #[test]
    fn unknown_family_is_a_parse_error() {
        let text = "experiments:\n  - name: x\n    family: { kind: grace-hash }\n    schema: { table: t, columns: [c], data_file: d }\n";
        let err = HarnessConfig::from_yaml_str(text).unwrap_err();
        assert_eq!(err.info().code, "config-parse");
    }
}
