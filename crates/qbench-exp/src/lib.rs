//! Experiment orchestration for qbench: sweep plans, the driver that runs
//! them against an engine, and the stores that keep their result series.

mod driver;
mod hash;
mod plan;
mod serde;
mod store;

pub use driver::{Driver, SweepOutcome};
pub use hash::stable_hash_string;
pub use plan::{ExperimentFamily, ExperimentPlan, SweepSpec};
pub use store::ResultStore;

pub use serde::{from_json_slice, to_canonical_json_bytes, to_canonical_json_string};
