use serde::{Deserialize, Serialize};

use crate::types::{CtbTrend, MetricField, ScanResult, SqueezeType};

/// Caller-supplied post-filter over scan results. Every supplied predicate must
/// hold; absent fields and empty sets impose no constraint. A metric predicate
/// rejects results whose source never reported that metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanFilters {
    pub min_score: Option<u8>,
    pub min_short_interest: Option<f64>,
    pub min_utilization: Option<f64>,
    pub min_days_to_cover: Option<f64>,
    pub min_cost_to_borrow: Option<f64>,
    pub max_float: Option<u64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub classifications: Vec<SqueezeType>,
    pub ctb_trends: Vec<CtbTrend>,
    pub min_safety: Option<f64>,
    pub min_flow_sentiment: Option<f64>,
    pub min_unusual_multiplier: Option<f64>,
    pub min_data_quality: Option<f64>,
}

impl ScanFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, r: &ScanResult) -> bool {
        let m = &r.metrics;
        let known = |field: MetricField| m.is_supplied(field);

        self.min_score.map_or(true, |min| r.score.score >= min)
            && at_least(self.min_short_interest, known(MetricField::ShortInterest), m.short_interest_pct)
            && at_least(self.min_utilization, known(MetricField::Utilization), m.utilization_pct)
            && at_least(self.min_days_to_cover, known(MetricField::DaysToCover), m.days_to_cover)
            && at_least(self.min_cost_to_borrow, known(MetricField::CostToBorrow), m.cost_to_borrow_pct)
            && self
                .max_float
                .map_or(true, |max| known(MetricField::FreeFloat) && m.free_float <= max)
            && at_least(self.min_price, known(MetricField::Price), m.price)
            && self
                .max_price
                .map_or(true, |max| known(MetricField::Price) && m.price <= max)
            && (self.classifications.is_empty()
                || self.classifications.contains(&r.classification.squeeze_type))
            && (self.ctb_trends.is_empty()
                || (known(MetricField::CostToBorrowTrend)
                    && self.ctb_trends.contains(&m.cost_to_borrow_trend)))
            && at_least(self.min_safety, known(MetricField::FundamentalSafety), m.fundamental_safety_score)
            && at_least(self.min_flow_sentiment, known(MetricField::FlowSentiment), m.flow_sentiment)
            && at_least(
                self.min_unusual_multiplier,
                known(MetricField::UnusualActivity),
                m.unusual_activity_multiplier,
            )
            && at_least(self.min_data_quality, known(MetricField::DataQuality), m.data_quality_coverage)
    }

    pub fn apply(&self, results: &[ScanResult]) -> Vec<ScanResult> {
        results.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

fn at_least(min: Option<f64>, supplied: bool, value: f64) -> bool {
    min.map_or(true, |min| supplied && value >= min)
}
