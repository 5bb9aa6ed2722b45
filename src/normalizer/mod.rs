pub mod metrics;

pub use metrics::{normalize, RawMetrics};
