use serde::{Deserialize, Serialize};

use crate::config::metric_defaults;

// ---------------------------------------------------------------------------
// Metric fields
// ---------------------------------------------------------------------------

/// Every canonical field of a `MetricsRecord`. Used to track which values were
/// actually supplied by a source rather than filled in from defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    ShortInterest,
    ShortInterestConfidence,
    ShortInterestDiscrepancy,
    Utilization,
    AvailableShares,
    CostToBorrow,
    CostToBorrowTrend,
    CtbAcceleration,
    DaysToCover,
    FreeFloat,
    SharesOutstanding,
    GammaExposure,
    FlowSentiment,
    UnusualActivity,
    SweepCount,
    FundamentalSafety,
    DataQuality,
    StockScore,
    Price,
}

impl MetricField {
    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Bit set of `MetricField`s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet(u32);

impl FieldSet {
    pub fn insert(&mut self, field: MetricField) {
        self.0 |= field.bit();
    }

    pub fn contains(&self, field: MetricField) -> bool {
        self.0 & field.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }
}

// ---------------------------------------------------------------------------
// Cost-to-borrow trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CtbTrend {
    /// current / historical > 2.0
    Exploding,
    /// ratio 1.5–2.0
    RisingFast,
    /// ratio 1.2–1.5
    Rising,
    /// ratio 0.8–1.2
    Stable,
    /// ratio < 0.8
    Falling,
    Unknown,
}

impl CtbTrend {
    /// Buckets the ratio of current to historical-average borrow fee.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 2.0 {
            CtbTrend::Exploding
        } else if ratio > 1.5 {
            CtbTrend::RisingFast
        } else if ratio > 1.2 {
            CtbTrend::Rising
        } else if ratio < 0.8 {
            CtbTrend::Falling
        } else {
            CtbTrend::Stable
        }
    }

    /// Lenient label parser: case and separator insensitive, unknown labels map to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let norm: String = label
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match norm.as_str() {
            "EXPLODING" => CtbTrend::Exploding,
            "RISINGFAST" => CtbTrend::RisingFast,
            "RISING" => CtbTrend::Rising,
            "STABLE" => CtbTrend::Stable,
            "FALLING" => CtbTrend::Falling,
            _ => CtbTrend::Unknown,
        }
    }
}

impl std::fmt::Display for CtbTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CtbTrend::Exploding => "EXPLODING",
            CtbTrend::RisingFast => "RISING_FAST",
            CtbTrend::Rising => "RISING",
            CtbTrend::Stable => "STABLE",
            CtbTrend::Falling => "FALLING",
            CtbTrend::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// MetricsRecord
// ---------------------------------------------------------------------------

/// Canonical per-symbol inputs for one evaluation. Built by the normalizer;
/// every field holds its documented default when the source had no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub short_interest_pct: f64,
    pub short_interest_confidence: f64,
    pub short_interest_discrepancy: f64,
    pub utilization_pct: f64,
    pub available_shares: u64,
    pub cost_to_borrow_pct: f64,
    pub cost_to_borrow_trend: CtbTrend,
    pub ctb_acceleration: f64,
    pub days_to_cover: f64,
    pub free_float: u64,
    pub shares_outstanding: u64,
    pub gamma_exposure: f64,
    pub flow_sentiment: f64,
    pub unusual_activity_multiplier: f64,
    pub sweep_count: u64,
    pub fundamental_safety_score: f64,
    pub data_quality_coverage: f64,
    pub stock_score: f64,
    pub price: f64,
    /// Fields that came from the source rather than from defaults.
    pub supplied: FieldSet,
}

impl Default for MetricsRecord {
    fn default() -> Self {
        Self {
            short_interest_pct: 0.0,
            short_interest_confidence: 0.0,
            short_interest_discrepancy: 0.0,
            utilization_pct: 0.0,
            available_shares: 0,
            cost_to_borrow_pct: 0.0,
            cost_to_borrow_trend: CtbTrend::Stable,
            ctb_acceleration: metric_defaults::CTB_ACCELERATION,
            days_to_cover: 0.0,
            free_float: 0,
            shares_outstanding: 0,
            gamma_exposure: 0.0,
            flow_sentiment: metric_defaults::FLOW_SENTIMENT,
            unusual_activity_multiplier: metric_defaults::UNUSUAL_ACTIVITY_MULTIPLIER,
            sweep_count: 0,
            fundamental_safety_score: metric_defaults::FUNDAMENTAL_SAFETY,
            data_quality_coverage: 0.0,
            stock_score: metric_defaults::STOCK_SCORE,
            price: 0.0,
            supplied: FieldSet::default(),
        }
    }
}

impl MetricsRecord {
    pub fn is_supplied(&self, field: MetricField) -> bool {
        self.supplied.contains(field)
    }

    /// free_float / shares_outstanding, when both are known and positive.
    pub fn float_ratio(&self) -> Option<f64> {
        if self.free_float > 0 && self.shares_outstanding > 0 {
            Some(self.free_float as f64 / self.shares_outstanding as f64)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Score
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// score >= 90
    Legendary,
    /// 85–89
    Strong,
    /// 75–84
    Moderate,
    /// 60–74
    Weak,
    /// < 60
    Avoid,
}

impl Tier {
    pub fn from_score(score: u8) -> Self {
        use crate::config::tier_thresholds::*;
        if score >= LEGENDARY_MIN {
            Tier::Legendary
        } else if score >= STRONG_MIN {
            Tier::Strong
        } else if score >= MODERATE_MIN {
            Tier::Moderate
        } else if score >= WEAK_MIN {
            Tier::Weak
        } else {
            Tier::Avoid
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tier::Legendary => "LEGENDARY",
            Tier::Strong => "STRONG",
            Tier::Moderate => "MODERATE",
            Tier::Weak => "WEAK",
            Tier::Avoid => "AVOID",
        };
        write!(f, "{s}")
    }
}

/// Scoring factors, named for the score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    ShortInterest,
    Utilization,
    CostToBorrow,
    DaysToCover,
    CtbTrend,
    CtbAcceleration,
    AvailabilityPressure,
    SiConfidence,
    FloatRatio,
    GammaExposure,
    FlowSentiment,
    UnusualActivity,
    SweepCount,
    FundamentalSafety,
    DataQuality,
    StockScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub factor: ScoreFactor,
    /// Weighted points after capping.
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: u8,
    pub tier: Tier,
    pub breakdown: Vec<FactorContribution>,
}

impl ScoreResult {
    pub fn zero() -> Self {
        Self { score: 0, tier: Tier::Avoid, breakdown: Vec::new() }
    }
}

// ---------------------------------------------------------------------------
// Squeeze classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqueezeType {
    GammaShortCombo,
    ClassicShortSqueeze,
    BorrowingCrisis,
    GammaSqueeze,
    LowFloatSqueeze,
    PotentialSetup,
    Monitoring,
    /// Upstream data could not be obtained for the symbol.
    Error,
}

impl std::fmt::Display for SqueezeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SqueezeType::GammaShortCombo => "GAMMA_SHORT_COMBO",
            SqueezeType::ClassicShortSqueeze => "CLASSIC_SHORT_SQUEEZE",
            SqueezeType::BorrowingCrisis => "BORROWING_CRISIS",
            SqueezeType::GammaSqueeze => "GAMMA_SQUEEZE",
            SqueezeType::LowFloatSqueeze => "LOW_FLOAT_SQUEEZE",
            SqueezeType::PotentialSetup => "POTENTIAL_SETUP",
            SqueezeType::Monitoring => "MONITORING",
            SqueezeType::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Timing {
    Imminent,
    NearTerm,
    ShortTerm,
    MediumTerm,
    Building,
    Early,
    Monitoring,
}

impl std::fmt::Display for Timing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Timing::Imminent => "IMMINENT",
            Timing::NearTerm => "NEAR_TERM",
            Timing::ShortTerm => "SHORT_TERM",
            Timing::MediumTerm => "MEDIUM_TERM",
            Timing::Building => "BUILDING",
            Timing::Early => "EARLY",
            Timing::Monitoring => "MONITORING",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqueezeClassification {
    pub squeeze_type: SqueezeType,
    pub timing: Timing,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Critical,
    High,
    Medium,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Critical => write!(f, "CRITICAL"),
            AlertLevel::High => write!(f, "HIGH"),
            AlertLevel::Medium => write!(f, "MEDIUM"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    CtbExplosion,
    LegendarySetup,
    ExtremeUtilization,
    HighShortInterest,
    SqueezeImminent,
    UnusualFlow,
    DataDiscrepancy,
    ComboSqueeze,
    ApiError,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertType::CtbExplosion => "CTB_EXPLOSION",
            AlertType::LegendarySetup => "LEGENDARY_SETUP",
            AlertType::ExtremeUtilization => "EXTREME_UTILIZATION",
            AlertType::HighShortInterest => "HIGH_SHORT_INTEREST",
            AlertType::SqueezeImminent => "SQUEEZE_IMMINENT",
            AlertType::UnusualFlow => "UNUSUAL_FLOW",
            AlertType::DataDiscrepancy => "DATA_DISCREPANCY",
            AlertType::ComboSqueeze => "COMBO_SQUEEZE",
            AlertType::ApiError => "API_ERROR",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub alert_type: AlertType,
    /// Human-readable text. Not stable; consume `alert_type` and `value` instead.
    pub message: String,
    /// Raw numeric value that triggered the rule.
    pub value: f64,
}

// ---------------------------------------------------------------------------
// Scan results
// ---------------------------------------------------------------------------

/// Everything produced for one symbol in one scan cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub symbol: String,
    pub metrics: MetricsRecord,
    pub score: ScoreResult,
    pub classification: SqueezeClassification,
    pub alerts: Vec<Alert>,
    /// Nanosecond UTC epoch timestamp.
    pub timestamp_ns: u64,
    /// Set when the symbol degraded to the error sentinel.
    pub error: Option<String>,
}

impl ScanResult {
    pub fn is_error(&self) -> bool {
        self.classification.squeeze_type == SqueezeType::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCount {
    pub squeeze_type: SqueezeType,
    pub count: usize,
}

/// Portfolio-level reduction over a batch of scan results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub legendary: usize,
    pub strong: usize,
    pub moderate: usize,
    pub weak: usize,
    pub avoid: usize,
    pub average_score: u8,
    pub alert_count: usize,
    pub explosion_count: usize,
    pub imminent_count: usize,
    pub top_classifications: Vec<ClassificationCount>,
    /// Strong-or-better results in a short/borrow-driven classification.
    pub high_value_opportunities: usize,
    pub average_data_quality: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctb_trend_ratio_buckets() {
        assert_eq!(CtbTrend::from_ratio(2.5), CtbTrend::Exploding);
        assert_eq!(CtbTrend::from_ratio(2.0), CtbTrend::RisingFast);
        assert_eq!(CtbTrend::from_ratio(1.3), CtbTrend::Rising);
        assert_eq!(CtbTrend::from_ratio(1.0), CtbTrend::Stable);
        assert_eq!(CtbTrend::from_ratio(0.8), CtbTrend::Stable);
        assert_eq!(CtbTrend::from_ratio(0.5), CtbTrend::Falling);
    }

    #[test]
    fn ctb_trend_labels_are_lenient() {
        assert_eq!(CtbTrend::from_label("exploding"), CtbTrend::Exploding);
        assert_eq!(CtbTrend::from_label("Rising-Fast"), CtbTrend::RisingFast);
        assert_eq!(CtbTrend::from_label("RISING_FAST"), CtbTrend::RisingFast);
        assert_eq!(CtbTrend::from_label("sideways"), CtbTrend::Unknown);
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        assert_eq!(Tier::from_score(90), Tier::Legendary);
        assert_eq!(Tier::from_score(89), Tier::Strong);
        assert_eq!(Tier::from_score(85), Tier::Strong);
        assert_eq!(Tier::from_score(84), Tier::Moderate);
        assert_eq!(Tier::from_score(75), Tier::Moderate);
        assert_eq!(Tier::from_score(74), Tier::Weak);
        assert_eq!(Tier::from_score(60), Tier::Weak);
        assert_eq!(Tier::from_score(59), Tier::Avoid);
    }

    #[test]
    fn field_set_tracks_membership() {
        let mut set = FieldSet::default();
        assert!(set.is_empty());
        set.insert(MetricField::Price);
        set.insert(MetricField::ShortInterest);
        set.insert(MetricField::Price);
        assert!(set.contains(MetricField::Price));
        assert!(!set.contains(MetricField::FreeFloat));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn default_record_has_documented_defaults() {
        let m = MetricsRecord::default();
        assert_eq!(m.flow_sentiment, 50.0);
        assert_eq!(m.unusual_activity_multiplier, 1.0);
        assert_eq!(m.fundamental_safety_score, 50.0);
        assert_eq!(m.cost_to_borrow_trend, CtbTrend::Stable);
        assert!(m.float_ratio().is_none());
        assert!(m.supplied.is_empty());
    }

    #[test]
    fn alert_serializes_screaming_case() {
        let alert = Alert {
            level: AlertLevel::Critical,
            alert_type: AlertType::CtbExplosion,
            message: String::new(),
            value: 60.0,
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["level"], "CRITICAL");
        assert_eq!(json["alert_type"], "CTB_EXPLOSION");
    }
}
