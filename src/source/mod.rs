//! Interchangeable providers of raw per-symbol metrics. The engine never knows
//! whether a payload was generated, read from disk, or fetched live.

pub mod demo;
pub mod file;

use async_trait::async_trait;

use crate::error::Result;
use crate::normalizer::RawMetrics;

pub use demo::DemoSource;
pub use file::FileSource;

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Raw payload for one symbol. An `Err` degrades that symbol to the error
    /// sentinel; it never aborts a batch.
    async fn fetch(&self, symbol: &str) -> Result<RawMetrics>;
}
