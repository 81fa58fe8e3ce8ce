use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use qbench_exp::ResultStore;

#[derive(Args, Debug)]
pub struct CompareArgs {
    #[arg(long, default_value = "results")]
    pub store: PathBuf,
    /// Store holding the right-hand series, when it differs from `--store`.
    #[arg(long = "right-store")]
    pub right_store: Option<PathBuf>,
    pub left: String,
    pub right: String,
}

pub fn run(args: &CompareArgs) -> Result<(), Box<dyn Error>> {
    let left_store = ResultStore::from_path(&args.store);
    let right_store = args
        .right_store
        .as_ref()
        .map(ResultStore::from_path)
        .unwrap_or_else(|| left_store.clone());
    let left = left_store.load(&args.left)?;
    let right = right_store.load(&args.right)?;

    let right_map = right.latency_map();
    println!("point\t{}\t{}\tratio", left.name(), right.name());
    let mut shared = 0usize;
    for (point, left_us) in left.completed() {
        let Some(right_us) = right_map.get(&point.key()) else {
            continue;
        };
        shared += 1;
        let ratio = if *right_us == 0 {
            f64::INFINITY
        } else {
            left_us as f64 / *right_us as f64
        };
        println!("{point}\t{left_us}\t{right_us}\t{ratio:.3}");
    }
    let left_only = left.completed().count() - shared;
    let right_only = right_map.len() - shared;
    if left_only > 0 || right_only > 0 {
        println!("# unmatched points: {left_only} left only, {right_only} right only");
    }
    Ok(())
}
