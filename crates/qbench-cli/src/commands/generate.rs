use std::collections::BTreeSet;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use qbench_core::errors::{BenchError, ErrorInfo};
use qbench_core::RngHandle;
use qbench_gen::{ValueDomain, WorkloadGenerator};
use tracing::info;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Selectivity targets in [0, 1), one script each.
    #[arg(long = "selectivity", num_args = 1.., default_values_t = [0.10, 0.50, 0.90])]
    pub selectivity: Vec<f64>,
    /// Selects per script.
    #[arg(long = "pass-num", default_value_t = 10)]
    pub pass_num: usize,
    /// Fully qualified column the selects target.
    #[arg(long, default_value = "db1.tbl1.col2")]
    pub column: String,
    #[arg(long, default_value_t = 0)]
    pub min: i64,
    #[arg(long, default_value_t = 100_000)]
    pub max: i64,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Directory receiving `selectivity_<target>.dsl` files.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &GenerateArgs) -> Result<(), Box<dyn Error>> {
    let domain = ValueDomain::new(args.min, args.max)?;
    let names = script_names(&args.selectivity)?;
    let mut generator = WorkloadGenerator::new(RngHandle::from_optional_seed(args.seed));
    fs::create_dir_all(&args.out)?;
    for (&selectivity, name) in args.selectivity.iter().zip(&names) {
        let script = generator.selectivity_scan(&args.column, selectivity, args.pass_num, &domain)?;
        let path = args.out.join(name);
        fs::write(&path, script.render())?;
        info!(path = %path.display(), selectivity, statements = script.len(), "script written");
        println!("{}", path.display());
    }
    Ok(())
}

/// One file name per target, using the shortest exact rendering of the value.
fn script_names(targets: &[f64]) -> Result<Vec<String>, BenchError> {
    let mut seen = BTreeSet::new();
    targets
        .iter()
        .map(|selectivity| {
            let name = format!("selectivity_{selectivity}.dsl");
            if !seen.insert(name.clone()) {
                return Err(BenchError::Configuration(
                    ErrorInfo::new("generate-duplicate-target", "selectivity target listed twice")
                        .with_context("selectivity", selectivity.to_string()),
                ));
            }
            Ok(name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(selectivity: Vec<f64>, out: PathBuf) -> GenerateArgs {
        GenerateArgs {
            selectivity,
            pass_num: 2,
            column: "db1.tbl1.col2".to_string(),
            min: 0,
            max: 100_000,
            seed: Some(5),
            out,
        }
    }

    #[test]
    fn close_targets_get_distinct_files() {
        let names = script_names(&[0.101, 0.104, 0.1]).unwrap();
        assert_eq!(
            names,
            ["selectivity_0.101.dsl", "selectivity_0.104.dsl", "selectivity_0.1.dsl"]
        );
    }

    #[test]
    fn repeated_target_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("scripts");
        let err = run(&args(vec![0.5, 0.5], out.clone())).unwrap_err();
        assert!(err.to_string().contains("generate-duplicate-target"));
        assert!(!out.exists());
    }

    #[test]
    fn writes_one_script_per_target() {
        let dir = tempfile::tempdir().unwrap();
        run(&args(vec![0.101, 0.104], dir.path().to_path_buf())).unwrap();
        for name in ["selectivity_0.101.dsl", "selectivity_0.104.dsl"] {
            let text = fs::read_to_string(dir.path().join(name)).unwrap();
            assert_eq!(text.lines().count(), 2);
            assert!(text.starts_with("s0=select(db1.tbl1.col2,"));
        }
    }
}
