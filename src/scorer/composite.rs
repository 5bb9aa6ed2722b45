use serde::{Deserialize, Serialize};

use crate::types::{
    CtbTrend, FactorContribution, MetricField, MetricsRecord, ScoreFactor, ScoreResult, Tier,
};

/// One capped scoring term: `clamp(raw * scale, 0, cap) * weight`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub scale: f64,
    pub cap: f64,
    pub weight: f64,
}

impl Factor {
    pub const fn new(scale: f64, cap: f64) -> Self {
        Self { scale, cap, weight: 1.0 }
    }

    pub const fn weighted(scale: f64, cap: f64, weight: f64) -> Self {
        Self { scale, cap, weight }
    }

    fn apply(&self, raw: f64) -> f64 {
        (raw * self.scale).max(0.0).min(self.cap) * self.weight
    }
}

/// Integer-points table: thirteen factors whose caps sum to 105 before the
/// total is clamped to the ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsWeights {
    pub short_interest: Factor,
    pub utilization: Factor,
    pub cost_to_borrow: Factor,
    pub days_to_cover: Factor,
    /// Applied to the discrete trend lookup (see `trend_points`).
    pub ctb_trend: Factor,
    /// Applied to `max(0, 100 - available_shares / 10_000)`.
    pub availability_pressure: Factor,
    pub si_confidence: Factor,
    /// Applied to the tiered float-ratio points (5 / 3 / 1).
    pub float_ratio: Factor,
    pub flow_sentiment: Factor,
    pub unusual_activity: Factor,
    pub fundamental_safety: Factor,
    pub data_quality: Factor,
    pub stock_score: Factor,
}

impl Default for PointsWeights {
    fn default() -> Self {
        Self {
            short_interest: Factor::new(0.67, 20.0),
            utilization: Factor::new(0.15, 15.0),
            cost_to_borrow: Factor::new(0.3, 15.0),
            days_to_cover: Factor::new(2.0, 10.0),
            ctb_trend: Factor::new(1.0, 10.0),
            availability_pressure: Factor::new(0.08, 8.0),
            si_confidence: Factor::new(0.07, 7.0),
            float_ratio: Factor::new(1.0, 5.0),
            flow_sentiment: Factor::new(0.05, 5.0),
            unusual_activity: Factor::new(0.5, 3.0),
            fundamental_safety: Factor::new(0.03, 3.0),
            data_quality: Factor::new(0.02, 2.0),
            stock_score: Factor::new(0.02, 2.0),
        }
    }
}

/// Continuous table: every term is normalized to 0–100 and then weighted,
/// weights summing to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    pub short_interest: Factor,
    pub utilization: Factor,
    /// Applied to `max(0, 15 - days_to_cover)`: fewer days to cover scores higher.
    pub days_to_cover: Factor,
    pub gamma_exposure: Factor,
    pub flow_sentiment: Factor,
    pub unusual_activity: Factor,
    pub sweep_count: Factor,
    pub ctb_acceleration: Factor,
    /// Applied to the composite squeeze pressure (see `squeeze_pressure`).
    pub availability_pressure: Factor,
    pub si_confidence: Factor,
    pub fundamental_safety: Factor,
    pub stock_score: Factor,
    /// Applied to the float-quality bucket (90 / 75 / 60 / 40).
    pub float_quality: Factor,
}

impl Default for LinearWeights {
    fn default() -> Self {
        Self {
            short_interest: Factor::weighted(100.0 / 30.0, 100.0, 0.18),
            utilization: Factor::weighted(1.0, 100.0, 0.15),
            days_to_cover: Factor::weighted(6.67, 100.0, 0.12),
            gamma_exposure: Factor::weighted(10.0, 100.0, 0.10),
            flow_sentiment: Factor::weighted(1.0, 100.0, 0.08),
            unusual_activity: Factor::weighted(20.0, 100.0, 0.08),
            sweep_count: Factor::weighted(5.0, 100.0, 0.04),
            ctb_acceleration: Factor::weighted(25.0, 100.0, 0.10),
            availability_pressure: Factor::weighted(1.0, 100.0, 0.08),
            si_confidence: Factor::weighted(1.0, 100.0, 0.03),
            fundamental_safety: Factor::weighted(1.0, 100.0, 0.02),
            stock_score: Factor::weighted(1.0, 100.0, 0.01),
            float_quality: Factor::weighted(1.0, 100.0, 0.01),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ScoringModel {
    Points(PointsWeights),
    Linear(LinearWeights),
}

/// Composite squeeze score. Only metrics the source actually supplied contribute,
/// so a defaulted field never adds points. The rounded total is clamped to `[0, ceiling]`.
pub fn compute_score(m: &MetricsRecord, model: &ScoringModel, ceiling: u8) -> ScoreResult {
    let mut tally = Tally::default();
    match model {
        ScoringModel::Points(w) => score_points(m, w, &mut tally),
        ScoringModel::Linear(w) => score_linear(m, w, &mut tally),
    }

    let total = tally.total().round().clamp(0.0, f64::from(ceiling));
    let score = total as u8;
    ScoreResult { score, tier: Tier::from_score(score), breakdown: tally.breakdown }
}

fn score_points(m: &MetricsRecord, w: &PointsWeights, t: &mut Tally) {
    let has = |f: MetricField| m.is_supplied(f);

    t.add(ScoreFactor::ShortInterest, has(MetricField::ShortInterest), m.short_interest_pct, &w.short_interest);
    t.add(ScoreFactor::Utilization, has(MetricField::Utilization), m.utilization_pct, &w.utilization);
    t.add(ScoreFactor::CostToBorrow, has(MetricField::CostToBorrow), m.cost_to_borrow_pct, &w.cost_to_borrow);
    t.add(ScoreFactor::DaysToCover, has(MetricField::DaysToCover), m.days_to_cover, &w.days_to_cover);
    t.add(
        ScoreFactor::CtbTrend,
        has(MetricField::CostToBorrowTrend),
        trend_points(m.cost_to_borrow_trend),
        &w.ctb_trend,
    );
    t.add(
        ScoreFactor::AvailabilityPressure,
        has(MetricField::AvailableShares),
        (100.0 - m.available_shares as f64 / 10_000.0).max(0.0),
        &w.availability_pressure,
    );
    t.add(
        ScoreFactor::SiConfidence,
        has(MetricField::ShortInterestConfidence),
        m.short_interest_confidence,
        &w.si_confidence,
    );
    if let Some(ratio) = m.float_ratio() {
        let points = if ratio < 0.3 {
            5.0
        } else if ratio < 0.5 {
            3.0
        } else {
            1.0
        };
        t.add(ScoreFactor::FloatRatio, true, points, &w.float_ratio);
    }
    t.add(ScoreFactor::FlowSentiment, has(MetricField::FlowSentiment), m.flow_sentiment, &w.flow_sentiment);
    t.add(
        ScoreFactor::UnusualActivity,
        has(MetricField::UnusualActivity),
        m.unusual_activity_multiplier,
        &w.unusual_activity,
    );
    t.add(
        ScoreFactor::FundamentalSafety,
        has(MetricField::FundamentalSafety),
        m.fundamental_safety_score,
        &w.fundamental_safety,
    );
    t.add(ScoreFactor::DataQuality, has(MetricField::DataQuality), m.data_quality_coverage, &w.data_quality);
    t.add(ScoreFactor::StockScore, has(MetricField::StockScore), m.stock_score, &w.stock_score);
}

fn score_linear(m: &MetricsRecord, w: &LinearWeights, t: &mut Tally) {
    let has = |f: MetricField| m.is_supplied(f);

    t.add(ScoreFactor::ShortInterest, has(MetricField::ShortInterest), m.short_interest_pct, &w.short_interest);
    t.add(ScoreFactor::Utilization, has(MetricField::Utilization), m.utilization_pct, &w.utilization);
    t.add(
        ScoreFactor::DaysToCover,
        has(MetricField::DaysToCover),
        (15.0 - m.days_to_cover).max(0.0),
        &w.days_to_cover,
    );
    t.add(ScoreFactor::GammaExposure, has(MetricField::GammaExposure), m.gamma_exposure, &w.gamma_exposure);
    t.add(ScoreFactor::FlowSentiment, has(MetricField::FlowSentiment), m.flow_sentiment, &w.flow_sentiment);
    t.add(
        ScoreFactor::UnusualActivity,
        has(MetricField::UnusualActivity),
        m.unusual_activity_multiplier,
        &w.unusual_activity,
    );
    t.add(ScoreFactor::SweepCount, has(MetricField::SweepCount), m.sweep_count as f64, &w.sweep_count);
    t.add(
        ScoreFactor::CtbAcceleration,
        has(MetricField::CtbAcceleration),
        m.ctb_acceleration,
        &w.ctb_acceleration,
    );
    t.add(
        ScoreFactor::AvailabilityPressure,
        has(MetricField::Utilization) || has(MetricField::AvailableShares),
        squeeze_pressure(m),
        &w.availability_pressure,
    );
    t.add(
        ScoreFactor::SiConfidence,
        has(MetricField::ShortInterestConfidence),
        m.short_interest_confidence,
        &w.si_confidence,
    );
    t.add(
        ScoreFactor::FundamentalSafety,
        has(MetricField::FundamentalSafety),
        m.fundamental_safety_score,
        &w.fundamental_safety,
    );
    t.add(ScoreFactor::StockScore, has(MetricField::StockScore), m.stock_score, &w.stock_score);
    if let Some(ratio) = m.float_ratio() {
        let quality = if ratio < 0.3 {
            90.0
        } else if ratio < 0.5 {
            75.0
        } else if ratio < 0.7 {
            60.0
        } else {
            40.0
        };
        t.add(ScoreFactor::FloatRatio, true, quality, &w.float_quality);
    }
}

/// Discrete points for the borrow-fee trend. RISING_FAST sits between RISING
/// and EXPLODING at 8; a table without that label would score it as 0.
pub fn trend_points(trend: CtbTrend) -> f64 {
    match trend {
        CtbTrend::Exploding => 10.0,
        CtbTrend::RisingFast => 8.0,
        CtbTrend::Rising => 7.0,
        CtbTrend::Stable => 3.0,
        CtbTrend::Falling | CtbTrend::Unknown => 0.0,
    }
}

/// 0–100 blend of utilization, borrow fee and scarcity of lendable shares.
pub fn squeeze_pressure(m: &MetricsRecord) -> f64 {
    let scarcity = 100.0 - m.available_shares as f64 / 10_000_000.0 * 100.0;
    let pressure = m.utilization_pct * 0.4
        + (m.cost_to_borrow_pct * 2.0).min(100.0) * 0.3
        + scarcity * 0.3;
    pressure.round().clamp(0.0, 100.0)
}

#[derive(Default)]
struct Tally {
    breakdown: Vec<FactorContribution>,
}

impl Tally {
    fn add(&mut self, factor: ScoreFactor, supplied: bool, raw: f64, weights: &Factor) {
        if supplied {
            self.breakdown.push(FactorContribution { factor, points: weights.apply(raw) });
        }
    }

    fn total(&self) -> f64 {
        self.breakdown.iter().map(|c| c.points).sum()
    }
}
