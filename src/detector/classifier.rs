use serde::{Deserialize, Serialize};

use crate::types::{CtbTrend, MetricField, MetricsRecord, SqueezeClassification, SqueezeType, Timing};

/// Thresholds for the classification cascade. All comparisons are strict (`>` / `<`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    pub combo_short_interest: f64,
    pub combo_utilization: f64,
    pub combo_cost_to_borrow: f64,
    /// Neutral flow sentiment; the combo needs call-heavy flow above it.
    pub flow_baseline: f64,
    pub classic_short_interest: f64,
    pub classic_utilization: f64,
    pub classic_days_to_cover: f64,
    pub crisis_cost_to_borrow: f64,
    pub gamma_flow_sentiment: f64,
    pub gamma_unusual_multiplier: f64,
    pub low_float_max_float: u64,
    pub low_float_short_interest: f64,
    pub low_float_utilization: f64,
    pub potential_setup_score: u8,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            combo_short_interest: 20.0,
            combo_utilization: 90.0,
            combo_cost_to_borrow: 30.0,
            flow_baseline: 50.0,
            classic_short_interest: 15.0,
            classic_utilization: 85.0,
            classic_days_to_cover: 3.0,
            crisis_cost_to_borrow: 50.0,
            gamma_flow_sentiment: 30.0,
            gamma_unusual_multiplier: 2.0,
            low_float_max_float: 50_000_000,
            low_float_short_interest: 10.0,
            low_float_utilization: 70.0,
            potential_setup_score: 60,
        }
    }
}

/// How the timing bucket is chosen once a type has matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingRule {
    /// Per-type score table; borrowing crises use the borrow fee instead.
    PerClassification,
    /// One metric-driven rule for every type.
    Unified,
}

/// Assign exactly one squeeze type and a timing bucket. The cascade ends in a
/// catch-all, so every record classifies.
pub fn classify(
    m: &MetricsRecord,
    score: u8,
    t: &ClassifierThresholds,
    rule: TimingRule,
) -> SqueezeClassification {
    let squeeze_type = squeeze_type(m, score, t);
    let timing = match rule {
        TimingRule::PerClassification => classification_timing(squeeze_type, m, score),
        TimingRule::Unified => unified_timing(m),
    };
    SqueezeClassification { squeeze_type, timing }
}

/// Ordered rule cascade: first match wins, order is significant.
fn squeeze_type(m: &MetricsRecord, score: u8, t: &ClassifierThresholds) -> SqueezeType {
    let si = m.short_interest_pct;
    let util = m.utilization_pct;
    let ctb = m.cost_to_borrow_pct;

    if si > t.combo_short_interest
        && util > t.combo_utilization
        && ctb > t.combo_cost_to_borrow
        && m.flow_sentiment > t.flow_baseline
    {
        SqueezeType::GammaShortCombo
    } else if si > t.classic_short_interest
        && util > t.classic_utilization
        && m.days_to_cover > t.classic_days_to_cover
    {
        SqueezeType::ClassicShortSqueeze
    } else if ctb > t.crisis_cost_to_borrow || m.cost_to_borrow_trend == CtbTrend::Exploding {
        SqueezeType::BorrowingCrisis
    } else if m.flow_sentiment > t.gamma_flow_sentiment
        && m.unusual_activity_multiplier > t.gamma_unusual_multiplier
    {
        SqueezeType::GammaSqueeze
    } else if m.is_supplied(MetricField::FreeFloat)
        && m.free_float < t.low_float_max_float
        && si > t.low_float_short_interest
        && util > t.low_float_utilization
    {
        // An unknown float is not a small float.
        SqueezeType::LowFloatSqueeze
    } else if score > t.potential_setup_score {
        SqueezeType::PotentialSetup
    } else {
        SqueezeType::Monitoring
    }
}

/// Per-type timing table.
///
/// | type                  | rule                                           |
/// |-----------------------|------------------------------------------------|
/// | GAMMA_SHORT_COMBO     | >85 IMMINENT, >75 BUILDING, else EARLY         |
/// | CLASSIC_SHORT_SQUEEZE | >80 IMMINENT, >70 BUILDING, else EARLY         |
/// | BORROWING_CRISIS      | ctb >100 IMMINENT, else BUILDING               |
/// | GAMMA_SQUEEZE         | >75 BUILDING, else EARLY                       |
/// | LOW_FLOAT_SQUEEZE     | >70 BUILDING, else EARLY                       |
/// | POTENTIAL_SETUP       | >75 BUILDING, else MONITORING                  |
/// | MONITORING            | EARLY                                          |
/// | ERROR                 | MONITORING                                     |
pub fn classification_timing(squeeze_type: SqueezeType, m: &MetricsRecord, score: u8) -> Timing {
    match squeeze_type {
        SqueezeType::GammaShortCombo => score_ladder(score, Some(85), 75, Timing::Early),
        SqueezeType::ClassicShortSqueeze => score_ladder(score, Some(80), 70, Timing::Early),
        SqueezeType::BorrowingCrisis => {
            if m.cost_to_borrow_pct > 100.0 {
                Timing::Imminent
            } else {
                Timing::Building
            }
        }
        SqueezeType::GammaSqueeze => score_ladder(score, None, 75, Timing::Early),
        SqueezeType::LowFloatSqueeze => score_ladder(score, None, 70, Timing::Early),
        SqueezeType::PotentialSetup => score_ladder(score, None, 75, Timing::Monitoring),
        SqueezeType::Monitoring => Timing::Early,
        SqueezeType::Error => Timing::Monitoring,
    }
}

fn score_ladder(score: u8, imminent_above: Option<u8>, building_above: u8, otherwise: Timing) -> Timing {
    match imminent_above {
        Some(limit) if score > limit => Timing::Imminent,
        _ if score > building_above => Timing::Building,
        _ => otherwise,
    }
}

/// Metric-driven timing shared by all types.
pub fn unified_timing(m: &MetricsRecord) -> Timing {
    if m.cost_to_borrow_trend == CtbTrend::Exploding || m.utilization_pct > 95.0 {
        Timing::Imminent
    } else if m.days_to_cover < 3.0 && m.ctb_acceleration > 1.5 {
        Timing::NearTerm
    } else if m.days_to_cover < 7.0 && m.utilization_pct > 80.0 {
        Timing::ShortTerm
    } else {
        Timing::MediumTerm
    }
}
