pub mod aggregator;
pub mod filters;

pub use aggregator::summarize;
pub use filters::ScanFilters;
