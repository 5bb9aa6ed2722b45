use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ScoringPreset;
use crate::detector::{
    api_error_alert, classify, generate_alerts, AlertThresholds, ClassifierThresholds, TimingRule,
};
use crate::error::Result;
use crate::normalizer::{normalize, RawMetrics};
use crate::scorer::{compute_score, LinearWeights, PointsWeights, ScoringModel};
use crate::summary;
use crate::types::{
    MetricsRecord, ScanResult, ScoreResult, SqueezeClassification, SqueezeType, Summary, Timing,
};

/// Every tunable of the pipeline. Build from a preset, then adjust with `with_*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub scoring: ScoringModel,
    /// Highest score the engine reports.
    pub score_ceiling: u8,
    pub classifier: ClassifierThresholds,
    pub timing: TimingRule,
    pub alerts: AlertThresholds,
}

impl EngineConfig {
    /// Integer points table, ceiling 100, per-type timing. The canonical preset.
    pub fn points() -> Self {
        Self {
            scoring: ScoringModel::Points(PointsWeights::default()),
            score_ceiling: 100,
            classifier: ClassifierThresholds::default(),
            timing: TimingRule::PerClassification,
            alerts: AlertThresholds::default(),
        }
    }

    /// Continuous weighted formula, ceiling 99, unified timing.
    pub fn linear() -> Self {
        Self {
            scoring: ScoringModel::Linear(LinearWeights::default()),
            score_ceiling: 99,
            classifier: ClassifierThresholds::default(),
            timing: TimingRule::Unified,
            alerts: AlertThresholds::default(),
        }
    }

    pub fn from_preset(preset: ScoringPreset) -> Self {
        match preset {
            ScoringPreset::Points => Self::points(),
            ScoringPreset::Linear => Self::linear(),
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringModel, ceiling: u8) -> Self {
        self.scoring = scoring;
        self.score_ceiling = ceiling.min(100);
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierThresholds) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_timing(mut self, timing: TimingRule) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_alerts(mut self, alerts: AlertThresholds) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_discrepancy_threshold(mut self, threshold: f64) -> Self {
        self.alerts.data_discrepancy = threshold;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::points()
    }
}

/// Stateless scoring pipeline: normalize → score → classify → alert.
/// Holds only configuration, so one instance can be shared across tasks.
#[derive(Debug, Clone, Default)]
pub struct SqueezeEngine {
    config: EngineConfig,
}

impl SqueezeEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate one symbol, stamped with the current time.
    pub fn evaluate(&self, symbol: &str, raw: &RawMetrics) -> Result<ScanResult> {
        self.evaluate_at(symbol, raw, now_ns())
    }

    /// Evaluate with an explicit timestamp. Identical inputs give identical output.
    pub fn evaluate_at(&self, symbol: &str, raw: &RawMetrics, timestamp_ns: u64) -> Result<ScanResult> {
        let metrics = normalize(raw)?;
        Ok(self.evaluate_record(symbol, metrics, timestamp_ns))
    }

    /// Run the pipeline over an already-normalized record.
    pub fn evaluate_record(&self, symbol: &str, metrics: MetricsRecord, timestamp_ns: u64) -> ScanResult {
        let cfg = &self.config;
        let score = compute_score(&metrics, &cfg.scoring, cfg.score_ceiling);
        let classification = classify(&metrics, score.score, &cfg.classifier, cfg.timing);
        let alerts = generate_alerts(&metrics, score.score, &classification, &cfg.alerts);

        debug!(
            symbol,
            score = score.score,
            tier = %score.tier,
            classification = %classification.squeeze_type,
            timing = %classification.timing,
            alerts = alerts.len(),
            "evaluated"
        );

        ScanResult {
            symbol: symbol.to_string(),
            metrics,
            score,
            classification,
            alerts,
            timestamp_ns,
            error: None,
        }
    }

    /// Sentinel for a symbol whose data could not be obtained: score 0,
    /// classification ERROR and a single API_ERROR alert.
    pub fn error_result(&self, symbol: &str, reason: &str, timestamp_ns: u64) -> ScanResult {
        ScanResult {
            symbol: symbol.to_string(),
            metrics: MetricsRecord::default(),
            score: ScoreResult::zero(),
            classification: SqueezeClassification {
                squeeze_type: SqueezeType::Error,
                timing: Timing::Monitoring,
            },
            alerts: vec![api_error_alert(reason)],
            timestamp_ns,
            error: Some(reason.to_string()),
        }
    }

    pub fn summarize(&self, results: &[ScanResult]) -> Summary {
        summary::summarize(results)
    }
}

pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::types::{AlertLevel, AlertType, Tier};
    use serde_json::json;

    fn raw(v: serde_json::Value) -> RawMetrics {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn presets_differ_in_ceiling_and_timing() {
        let p = EngineConfig::points();
        let l = EngineConfig::linear();
        assert_eq!(p.score_ceiling, 100);
        assert_eq!(l.score_ceiling, 99);
        assert_eq!(p.timing, TimingRule::PerClassification);
        assert_eq!(l.timing, TimingRule::Unified);
        assert_eq!(EngineConfig::default(), p);
        assert_eq!(EngineConfig::from_preset(ScoringPreset::Linear), l);
    }

    #[test]
    fn builder_overrides_single_knobs() {
        let cfg = EngineConfig::points()
            .with_discrepancy_threshold(5.0)
            .with_timing(TimingRule::Unified);
        assert_eq!(cfg.alerts.data_discrepancy, 5.0);
        assert_eq!(cfg.timing, TimingRule::Unified);
        assert_eq!(cfg.alerts.legendary_score, 90);
    }

    #[test]
    fn ceiling_cannot_exceed_hundred() {
        let cfg = EngineConfig::points()
            .with_scoring(ScoringModel::Points(PointsWeights::default()), 250);
        assert_eq!(cfg.score_ceiling, 100);
    }

    #[test]
    fn empty_payload_is_quiet_monitoring() {
        let engine = SqueezeEngine::default();
        let r = engine.evaluate_at("EMPTY", &RawMetrics::new(), 7).unwrap();
        assert_eq!(r.score.score, 0);
        assert_eq!(r.score.tier, Tier::Avoid);
        assert_eq!(r.classification.squeeze_type, SqueezeType::Monitoring);
        assert!(r.alerts.is_empty());
        assert_eq!(r.timestamp_ns, 7);
        assert!(!r.is_error());
    }

    #[test]
    fn malformed_payload_raises_at_normalizer() {
        let engine = SqueezeEngine::default();
        let err = engine.evaluate("BAD", &raw(json!({ "utilization": [90] }))).unwrap_err();
        assert!(matches!(err, AppError::Normalize { .. }));
    }

    #[test]
    fn evaluate_at_is_deterministic() {
        let engine = SqueezeEngine::new(EngineConfig::linear());
        let payload = raw(json!({
            "short_interest": 31.2, "utilization": 97, "ctb": 80, "historical_ctb": 20,
            "dtc": 2.5, "gamma": 6, "sweep_count": 12, "flow_sentiment": 71,
        }));
        let a = engine.evaluate_at("GME", &payload, 1_000).unwrap();
        let b = engine.evaluate_at("GME", &payload, 1_000).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn error_result_shape() {
        let engine = SqueezeEngine::default();
        let r = engine.error_result("AMC", "upstream timeout", 42);
        assert!(r.is_error());
        assert_eq!(r.score.score, 0);
        assert_eq!(r.classification.squeeze_type, SqueezeType::Error);
        assert_eq!(r.alerts.len(), 1);
        assert_eq!(r.alerts[0].level, AlertLevel::High);
        assert_eq!(r.alerts[0].alert_type, AlertType::ApiError);
        assert_eq!(r.alerts[0].value, 0.0);
        assert_eq!(r.error.as_deref(), Some("upstream timeout"));
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = EngineConfig::linear().with_discrepancy_threshold(5.0);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
