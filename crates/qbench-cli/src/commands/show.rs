use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use qbench_core::TrialOutcome;
use qbench_exp::ResultStore;

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(long, default_value = "results")]
    pub store: PathBuf,
    /// Series name, `plan/variant/config`.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, default_value = "results")]
    pub store: PathBuf,
}

pub fn show(args: &ShowArgs) -> Result<(), Box<dyn Error>> {
    let series = ResultStore::from_path(&args.store).load(&args.name)?;
    println!("series     {}", series.name());
    println!("family     {}", series.family());
    println!("config     {}", series.config().label());
    println!("plan hash  {}", series.plan_hash());
    println!("created    {}", series.created_at());
    if let Some(us) = series.setup_us() {
        println!("setup      {us} us");
    }
    if series.is_cancelled() {
        println!("cancelled  true");
    }
    println!("point\telapsed_us");
    for entry in series.entries() {
        match &entry.outcome {
            TrialOutcome::Completed { elapsed_us } => println!("{}\t{}", entry.point, elapsed_us),
            TrialOutcome::Failed { error } => {
                println!("{}\tfailed ({})", entry.point, error.info().code)
            }
        }
    }
    Ok(())
}

pub fn list(args: &ListArgs) -> Result<(), Box<dyn Error>> {
    for name in ResultStore::from_path(&args.store).list()? {
        println!("{name}");
    }
    Ok(())
}
