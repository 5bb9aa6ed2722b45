pub mod alerts;
pub mod classifier;

pub use alerts::{api_error_alert, generate_alerts, AlertThresholds};
pub use classifier::{classify, ClassifierThresholds, TimingRule};
