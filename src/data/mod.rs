//! Typed loaders for test result files.

pub mod flent;
pub mod iperf;
pub mod sim;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("pscheduler diagnostics do not contain an embedded iperf3 result")]
    Pscheduler,
    #[error("stream {index} not present (test has {available})")]
    NoSuchStream { index: usize, available: usize },
    #[error("flow {0} not present")]
    NoSuchFlow(u32),
    #[error("series {name:?} is not a list of numbers")]
    BadSeries { name: String },
}
