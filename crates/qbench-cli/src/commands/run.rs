use std::error::Error;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Args;
use qbench_core::{derive_substream_seed, CancelToken, RngHandle};
use qbench_engine::{EngineController, TrialExecutor};
use qbench_exp::{Driver, ResultStore};
use qbench_gen::WorkloadGenerator;
use tracing::{info, warn};

use crate::config::HarnessConfig;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML harness configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Run only the named experiments (repeatable).
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,
    /// Master seed; overrides the configuration's seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Result store path; overrides the configuration's store.
    #[arg(long)]
    pub store: Option<PathBuf>,
    /// Cancel the sweep between trials once this many seconds have passed.
    #[arg(long = "budget-secs")]
    pub budget_secs: Option<u64>,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let config = HarnessConfig::load(&args.config)?;
    for name in &args.only {
        if !config.experiments.iter().any(|plan| &plan.name == name) {
            return Err(format!("no experiment named `{name}` in {}", args.config.display()).into());
        }
    }
    let store = ResultStore::from_path(args.store.clone().unwrap_or_else(|| config.store.clone()));
    let seed = args.seed.or(config.seed);
    let cancel = CancelToken::new();
    if let Some(secs) = args.budget_secs {
        let token = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            warn!(budget_secs = secs, "sweep budget exhausted, cancelling");
            token.cancel();
        });
    }

    for (idx, plan) in config.experiments.iter().enumerate() {
        if !args.only.is_empty() && !args.only.contains(&plan.name) {
            continue;
        }
        if cancel.is_cancelled() {
            break;
        }
        // Substreams keep a plan's draws independent of which other plans ran.
        let rng = RngHandle::from_optional_seed(seed.map(|master| derive_substream_seed(master, idx as u64)));
        let controller = EngineController::new(config.engine.clone())?;
        let executor = TrialExecutor::from_spec(&config.engine);
        let mut driver = Driver::new(controller, executor, WorkloadGenerator::new(rng))
            .with_cancel(cancel.clone());
        let outcome = driver.run_plan(plan)?;
        store.save_all(&outcome.series)?;

        for series in &outcome.series {
            println!(
                "{}\t{} points\t{} failed\tsetup {} us{}",
                series.name(),
                series.len(),
                series.failed_count(),
                series.setup_us().map(|us| us.to_string()).unwrap_or_else(|| "-".to_string()),
                if series.is_cancelled() { "\tcancelled" } else { "" }
            );
        }
        if outcome.failed_trials > 0 {
            warn!(plan = %plan.name, failed_trials = outcome.failed_trials, "sweep finished with failed trials");
        }
        if outcome.cancelled {
            warn!(plan = %plan.name, "sweep cancelled; partial series saved");
            break;
        }
    }
    info!(store = %store.path().display(), "run complete");
    Ok(())
}
