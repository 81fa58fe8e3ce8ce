//! Workload script generation for the qbench harness.
//!
//! Scripts are built from typed [`Statement`]s and rendered to the engine's
//! newline-separated command language only at the executor boundary.

pub mod interval;
pub mod schema;
pub mod script;
pub mod statement;
pub mod workload;

pub use interval::{
    ensure_window_fits, fixed_width_interval, realizable_span, selectivity_interval, selectivity_span,
    ScanBands, ValueDomain,
};
pub use schema::{IndexSpec, SchemaSpec};
pub use script::CommandScript;
pub use statement::{Clustering, IndexKind, JoinStrategy, Statement};
pub use workload::{JoinLayout, ScriptPair, WorkloadGenerator};
