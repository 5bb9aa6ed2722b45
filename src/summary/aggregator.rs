use crate::config::{tier_thresholds::STRONG_MIN, TOP_CLASSIFICATIONS};
use crate::types::{
    ClassificationCount, CtbTrend, ScanResult, SqueezeType, Summary, Tier, Timing,
};

/// Classifications that count toward `high_value_opportunities`.
const HIGH_VALUE_TYPES: &[SqueezeType] = &[
    SqueezeType::GammaShortCombo,
    SqueezeType::ClassicShortSqueeze,
    SqueezeType::BorrowingCrisis,
];

/// Reduce a batch of results into dashboard statistics. Recomputed from scratch
/// on every call; an empty batch yields the all-zero summary.
pub fn summarize(results: &[ScanResult]) -> Summary {
    let total = results.len();
    if total == 0 {
        return Summary::default();
    }

    let mut summary = Summary { total, ..Summary::default() };
    let mut score_sum = 0u64;
    let mut quality_sum = 0.0;
    // Insertion order doubles as first-seen order for tie breaking.
    let mut histogram: Vec<ClassificationCount> = Vec::new();

    for r in results {
        match r.score.tier {
            Tier::Legendary => summary.legendary += 1,
            Tier::Strong => summary.strong += 1,
            Tier::Moderate => summary.moderate += 1,
            Tier::Weak => summary.weak += 1,
            Tier::Avoid => summary.avoid += 1,
        }
        score_sum += u64::from(r.score.score);
        quality_sum += r.metrics.data_quality_coverage;
        summary.alert_count += r.alerts.len();

        if r.metrics.cost_to_borrow_trend == CtbTrend::Exploding {
            summary.explosion_count += 1;
        }
        if r.classification.timing == Timing::Imminent {
            summary.imminent_count += 1;
        }
        if r.score.score >= STRONG_MIN && HIGH_VALUE_TYPES.contains(&r.classification.squeeze_type) {
            summary.high_value_opportunities += 1;
        }

        let ty = r.classification.squeeze_type;
        match histogram.iter_mut().find(|c| c.squeeze_type == ty) {
            Some(entry) => entry.count += 1,
            None => histogram.push(ClassificationCount { squeeze_type: ty, count: 1 }),
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    histogram.sort_by(|a, b| b.count.cmp(&a.count));
    histogram.truncate(TOP_CLASSIFICATIONS);

    summary.average_score = (score_sum as f64 / total as f64).round() as u8;
    summary.average_data_quality = (quality_sum / total as f64).round().clamp(0.0, 100.0) as u8;
    summary.top_classifications = histogram;
    summary
}
