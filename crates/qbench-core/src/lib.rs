#![warn(missing_docs)]
#![doc = "Core data types for the qbench harness: error taxonomy, RNG handle, engine configuration and result series."]

pub mod cancel;
pub mod config;
pub mod errors;
pub mod rng;
pub mod series;

pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use errors::{BenchError, ErrorInfo};
pub use rng::{derive_substream_seed, RngHandle};
pub use series::{ParamPoint, ResultSeries, SeriesEntry, TrialOutcome};
