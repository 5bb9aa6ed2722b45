use serde::{Deserialize, Serialize};

use crate::types::{
    Alert, AlertLevel, AlertType, CtbTrend, MetricsRecord, SqueezeClassification, SqueezeType,
    Timing,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Inclusive: a score equal to this fires LEGENDARY_SETUP.
    pub legendary_score: u8,
    pub extreme_utilization: f64,
    pub high_short_interest: f64,
    pub unusual_flow_multiplier: f64,
    pub data_discrepancy: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            legendary_score: 90,
            extreme_utilization: 95.0,
            high_short_interest: 25.0,
            unusual_flow_multiplier: 3.0,
            data_discrepancy: 10.0,
        }
    }
}

/// Evaluate every alert rule independently, in a fixed order. Rules never
/// suppress each other and the output is not deduplicated.
pub fn generate_alerts(
    m: &MetricsRecord,
    score: u8,
    classification: &SqueezeClassification,
    t: &AlertThresholds,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let score_value = f64::from(score);

    if m.cost_to_borrow_trend == CtbTrend::Exploding {
        alerts.push(alert(
            AlertLevel::Critical,
            AlertType::CtbExplosion,
            format!("Cost to borrow exploding: {}%", m.cost_to_borrow_pct),
            m.cost_to_borrow_pct,
        ));
    }

    if score >= t.legendary_score {
        alerts.push(alert(
            AlertLevel::Critical,
            AlertType::LegendarySetup,
            format!("Legendary squeeze score: {score}"),
            score_value,
        ));
    }

    if m.utilization_pct > t.extreme_utilization {
        alerts.push(alert(
            AlertLevel::High,
            AlertType::ExtremeUtilization,
            format!("Extreme utilization: {}%", m.utilization_pct),
            m.utilization_pct,
        ));
    }

    if m.short_interest_pct > t.high_short_interest {
        alerts.push(alert(
            AlertLevel::High,
            AlertType::HighShortInterest,
            format!("High short interest: {}%", m.short_interest_pct),
            m.short_interest_pct,
        ));
    }

    if classification.timing == Timing::Imminent {
        alerts.push(alert(
            AlertLevel::Medium,
            AlertType::SqueezeImminent,
            format!("{} timing: {}", classification.squeeze_type, classification.timing),
            score_value,
        ));
    }

    if m.unusual_activity_multiplier > t.unusual_flow_multiplier {
        alerts.push(alert(
            AlertLevel::Medium,
            AlertType::UnusualFlow,
            format!("Unusual options flow: {}x", m.unusual_activity_multiplier),
            m.unusual_activity_multiplier,
        ));
    }

    if m.short_interest_discrepancy > t.data_discrepancy {
        alerts.push(alert(
            AlertLevel::Medium,
            AlertType::DataDiscrepancy,
            format!(
                "Estimated and official short interest differ by {} points",
                m.short_interest_discrepancy
            ),
            m.short_interest_discrepancy,
        ));
    }

    if classification.squeeze_type == SqueezeType::GammaShortCombo {
        alerts.push(alert(
            AlertLevel::Critical,
            AlertType::ComboSqueeze,
            "Gamma and short squeeze combo detected".to_string(),
            score_value,
        ));
    }

    alerts
}

/// The single alert carried by an error-sentinel result.
pub fn api_error_alert(reason: &str) -> Alert {
    alert(AlertLevel::High, AlertType::ApiError, format!("API error: {reason}"), 0.0)
}

fn alert(level: AlertLevel, alert_type: AlertType, message: String, value: f64) -> Alert {
    Alert { level, alert_type, message, value }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitoring() -> SqueezeClassification {
        SqueezeClassification { squeeze_type: SqueezeType::Monitoring, timing: Timing::Early }
    }

    fn types(alerts: &[Alert]) -> Vec<AlertType> {
        alerts.iter().map(|a| a.alert_type).collect()
    }

    fn run(m: &MetricsRecord, score: u8) -> Vec<Alert> {
        generate_alerts(m, score, &monitoring(), &AlertThresholds::default())
    }

    #[test]
    fn quiet_record_has_no_alerts() {
        assert!(run(&MetricsRecord::default(), 0).is_empty());
    }

    #[test]
    fn legendary_boundary_is_inclusive() {
        let alerts = run(&MetricsRecord::default(), 90);
        assert_eq!(types(&alerts), vec![AlertType::LegendarySetup]);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].value, 90.0);

        assert!(run(&MetricsRecord::default(), 89).is_empty());
    }

    #[test]
    fn ctb_explosion_is_critical_and_carries_fee() {
        let m = MetricsRecord {
            cost_to_borrow_pct: 60.0,
            cost_to_borrow_trend: CtbTrend::Exploding,
            ..MetricsRecord::default()
        };
        let alerts = run(&m, 0);
        assert_eq!(types(&alerts), vec![AlertType::CtbExplosion]);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].value, 60.0);
    }

    #[test]
    fn threshold_rules_are_strict() {
        let m = MetricsRecord {
            utilization_pct: 95.0,
            short_interest_pct: 25.0,
            unusual_activity_multiplier: 3.0,
            short_interest_discrepancy: 10.0,
            ..MetricsRecord::default()
        };
        assert!(run(&m, 0).is_empty());

        let m = MetricsRecord {
            utilization_pct: 95.5,
            short_interest_pct: 25.5,
            unusual_activity_multiplier: 3.5,
            short_interest_discrepancy: 10.5,
            ..MetricsRecord::default()
        };
        let alerts = run(&m, 0);
        assert_eq!(
            types(&alerts),
            vec![
                AlertType::ExtremeUtilization,
                AlertType::HighShortInterest,
                AlertType::UnusualFlow,
                AlertType::DataDiscrepancy,
            ]
        );
        assert_eq!(alerts[0].level, AlertLevel::High);
        assert_eq!(alerts[1].level, AlertLevel::High);
        assert_eq!(alerts[2].level, AlertLevel::Medium);
        assert_eq!(alerts[3].value, 10.5);
    }

    #[test]
    fn discrepancy_threshold_is_configurable() {
        let m = MetricsRecord { short_interest_discrepancy: 6.0, ..MetricsRecord::default() };
        assert!(run(&m, 0).is_empty());

        let strict = AlertThresholds { data_discrepancy: 5.0, ..AlertThresholds::default() };
        let alerts = generate_alerts(&m, 0, &monitoring(), &strict);
        assert_eq!(types(&alerts), vec![AlertType::DataDiscrepancy]);
    }

    #[test]
    fn combo_classification_fires_imminent_and_combo() {
        let c = SqueezeClassification {
            squeeze_type: SqueezeType::GammaShortCombo,
            timing: Timing::Imminent,
        };
        let alerts = generate_alerts(&MetricsRecord::default(), 92, &c, &AlertThresholds::default());
        assert_eq!(
            types(&alerts),
            vec![AlertType::LegendarySetup, AlertType::SqueezeImminent, AlertType::ComboSqueeze]
        );
        assert_eq!(alerts[1].level, AlertLevel::Medium);
        assert_eq!(alerts[1].value, 92.0);
        assert_eq!(alerts[2].level, AlertLevel::Critical);
    }

    #[test]
    fn rules_are_monotonic_in_their_metric() {
        let steps: Vec<f64> = (0..=200).map(|i| f64::from(i) * 0.5).collect();
        let rules: [(AlertType, fn(&mut MetricsRecord, f64)); 4] = [
            (AlertType::ExtremeUtilization, |m, v| m.utilization_pct = v),
            (AlertType::HighShortInterest, |m, v| m.short_interest_pct = v),
            (AlertType::UnusualFlow, |m, v| m.unusual_activity_multiplier = v),
            (AlertType::DataDiscrepancy, |m, v| m.short_interest_discrepancy = v),
        ];
        for (rule, set) in rules {
            let mut seen = false;
            for &v in &steps {
                let mut m = MetricsRecord::default();
                set(&mut m, v);
                let present = run(&m, 0).iter().any(|a| a.alert_type == rule);
                assert!(!(seen && !present), "{rule} disappeared at {v}");
                seen |= present;
            }
            assert!(seen, "{rule} never fired");
        }

        let mut seen = false;
        for score in 0..=100u8 {
            let present = run(&MetricsRecord::default(), score)
                .iter()
                .any(|a| a.alert_type == AlertType::LegendarySetup);
            assert!(!(seen && !present));
            seen |= present;
        }
        assert!(seen);
    }

    #[test]
    fn api_error_alert_shape() {
        let a = api_error_alert("timeout");
        assert_eq!(a.level, AlertLevel::High);
        assert_eq!(a.alert_type, AlertType::ApiError);
        assert_eq!(a.value, 0.0);
    }
}
