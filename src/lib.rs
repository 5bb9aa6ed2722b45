//! Short-squeeze opportunity scanner: normalizes heterogeneous market metrics,
//! scores them, classifies the squeeze pattern and raises alerts.

pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod normalizer;
pub mod scanner;
pub mod scorer;
pub mod source;
pub mod state;
pub mod summary;
pub mod types;

pub use engine::{EngineConfig, SqueezeEngine};
pub use error::{AppError, Result};
pub use normalizer::{normalize, RawMetrics};
pub use summary::ScanFilters;
pub use types::{MetricsRecord, ScanResult, Summary};
