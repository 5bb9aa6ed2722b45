use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::types::{CtbTrend, FieldSet, MetricField, MetricsRecord};

/// Flat provider payload for one symbol: key → number, numeric string, label, or null.
pub type RawMetrics = serde_json::Map<String, Value>;

// Accepted keys per field, canonical name first. Providers disagree on naming,
// so every alias seen in the wild maps onto the same field.
const SHORT_INTEREST_KEYS: &[&str] =
    &["short_interest_pct", "short_interest", "shortInterest", "si_percent", "estimated_si"];
const OFFICIAL_SHORT_INTEREST_KEYS: &[&str] = &["official_short_interest_pct", "official_si_percent"];
const CONFIDENCE_KEYS: &[&str] = &["short_interest_confidence", "si_confidence", "confidence"];
const DISCREPANCY_KEYS: &[&str] = &["short_interest_discrepancy", "discrepancy"];
const UTILIZATION_KEYS: &[&str] = &["utilization_pct", "utilization"];
const AVAILABLE_KEYS: &[&str] = &["available_shares", "available"];
const CTB_KEYS: &[&str] = &["cost_to_borrow_pct", "cost_to_borrow", "ctb", "current_ctb"];
const HISTORICAL_CTB_KEYS: &[&str] =
    &["historical_cost_to_borrow_pct", "historical_ctb", "historical_avg"];
const CTB_TREND_KEYS: &[&str] = &["cost_to_borrow_trend", "ctb_trend", "trend"];
const CTB_ACCELERATION_KEYS: &[&str] = &["ctb_acceleration"];
const DAYS_TO_COVER_KEYS: &[&str] = &["days_to_cover", "dtc"];
const SHORT_SHARES_KEYS: &[&str] = &["short_interest_shares", "shares_short"];
const AVG_VOLUME_KEYS: &[&str] = &["avg_daily_volume", "average_volume", "avg_volume"];
const FREE_FLOAT_KEYS: &[&str] = &["free_float"];
const SHARES_OUTSTANDING_KEYS: &[&str] = &["shares_outstanding", "outstanding"];
const GAMMA_KEYS: &[&str] = &["gamma_exposure", "total_gamma", "gamma"];
const FLOW_SENTIMENT_KEYS: &[&str] = &["flow_sentiment", "sentiment"];
const CALL_VOLUME_KEYS: &[&str] = &["call_volume"];
const PUT_VOLUME_KEYS: &[&str] = &["put_volume"];
const UNUSUAL_KEYS: &[&str] =
    &["unusual_activity_multiplier", "unusual_multiplier", "multiplier"];
const SWEEP_KEYS: &[&str] = &["sweep_count"];
const SAFETY_KEYS: &[&str] = &["fundamental_safety_score", "overall_safety"];
const FINANCIAL_HEALTH_KEYS: &[&str] = &["financial_health", "health_score"];
const VALUATION_RISK_KEYS: &[&str] = &["valuation_risk", "overvaluation_risk"];
const BANKRUPTCY_RISK_KEYS: &[&str] = &["bankruptcy_risk"];
const DILUTION_RISK_KEYS: &[&str] = &["dilution_risk"];
const DATA_QUALITY_KEYS: &[&str] = &["data_quality_coverage", "ortex_coverage", "coverage"];
const SOURCES_FETCHED_KEYS: &[&str] = &["sources_fetched", "sources_available"];
const SOURCES_EXPECTED_KEYS: &[&str] = &["sources_expected", "sources_total"];
const STOCK_SCORE_KEYS: &[&str] = &["stock_score", "squeeze_score"];
const PRICE_KEYS: &[&str] = &["price"];

/// Coerce a raw provider payload into a fully-populated `MetricsRecord`.
///
/// Absent and null fields take their documented defaults. Only a value of the
/// wrong shape (object, array, bool, unparseable string) is an error.
pub fn normalize(raw: &RawMetrics) -> Result<MetricsRecord> {
    let mut m = MetricsRecord::default();
    let mut supplied = FieldSet::default();

    // --- Short interest ---
    let estimated = number(raw, SHORT_INTEREST_KEYS)?;
    let official = number(raw, OFFICIAL_SHORT_INTEREST_KEYS)?;
    if let Some(si) = estimated {
        m.short_interest_pct = non_negative(si);
        supplied.insert(MetricField::ShortInterest);
    }

    let discrepancy = match number(raw, DISCREPANCY_KEYS)? {
        Some(d) => Some(d.abs()),
        None => estimated.zip(official).map(|(e, o)| (e - o).abs()),
    };
    if let Some(d) = discrepancy {
        m.short_interest_discrepancy = d;
        supplied.insert(MetricField::ShortInterestDiscrepancy);
    }

    let confidence = match number(raw, CONFIDENCE_KEYS)? {
        Some(c) => Some(c),
        None => si_confidence(estimated, official),
    };
    if let Some(c) = confidence {
        m.short_interest_confidence = percent(c);
        supplied.insert(MetricField::ShortInterestConfidence);
    }

    // --- Borrow availability ---
    if let Some(u) = number(raw, UTILIZATION_KEYS)? {
        m.utilization_pct = percent(u);
        supplied.insert(MetricField::Utilization);
    }
    if let Some(a) = number(raw, AVAILABLE_KEYS)? {
        m.available_shares = count(a);
        supplied.insert(MetricField::AvailableShares);
    }

    // --- Cost to borrow ---
    let current_ctb = number(raw, CTB_KEYS)?;
    if let Some(c) = current_ctb {
        m.cost_to_borrow_pct = non_negative(c);
        supplied.insert(MetricField::CostToBorrow);
    }
    let ctb_ratio = match (current_ctb, number(raw, HISTORICAL_CTB_KEYS)?) {
        (Some(current), Some(historical)) if historical > 0.0 => Some(non_negative(current) / historical),
        _ => None,
    };

    let trend = match label(raw, CTB_TREND_KEYS)? {
        Some(t) => Some(t),
        None => ctb_ratio.map(CtbTrend::from_ratio),
    };
    if let Some(t) = trend {
        m.cost_to_borrow_trend = t;
        supplied.insert(MetricField::CostToBorrowTrend);
    }

    let acceleration = match number(raw, CTB_ACCELERATION_KEYS)? {
        Some(a) => Some(a),
        None => ctb_ratio,
    };
    if let Some(a) = acceleration {
        m.ctb_acceleration = non_negative(a);
        supplied.insert(MetricField::CtbAcceleration);
    }

    // --- Float / days to cover ---
    let dtc = match number(raw, DAYS_TO_COVER_KEYS)? {
        Some(d) => Some(d),
        None => days_to_cover(number(raw, SHORT_SHARES_KEYS)?, number(raw, AVG_VOLUME_KEYS)?),
    };
    if let Some(d) = dtc {
        m.days_to_cover = non_negative(d);
        supplied.insert(MetricField::DaysToCover);
    }
    if let Some(f) = number(raw, FREE_FLOAT_KEYS)? {
        m.free_float = count(f);
        supplied.insert(MetricField::FreeFloat);
    }
    if let Some(s) = number(raw, SHARES_OUTSTANDING_KEYS)? {
        m.shares_outstanding = count(s);
        supplied.insert(MetricField::SharesOutstanding);
    }

    // --- Options flow ---
    if let Some(g) = number(raw, GAMMA_KEYS)? {
        m.gamma_exposure = g;
        supplied.insert(MetricField::GammaExposure);
    }

    let sentiment = match number(raw, FLOW_SENTIMENT_KEYS)? {
        Some(s) => Some(s),
        None => call_weighted_sentiment(
            number(raw, CALL_VOLUME_KEYS)?,
            number(raw, PUT_VOLUME_KEYS)?,
        ),
    };
    if let Some(s) = sentiment {
        m.flow_sentiment = percent(s);
        supplied.insert(MetricField::FlowSentiment);
    }
    if let Some(u) = number(raw, UNUSUAL_KEYS)? {
        m.unusual_activity_multiplier = non_negative(u);
        supplied.insert(MetricField::UnusualActivity);
    }
    if let Some(s) = number(raw, SWEEP_KEYS)? {
        m.sweep_count = count(s);
        supplied.insert(MetricField::SweepCount);
    }

    // --- Fundamentals / data quality ---
    let safety = match number(raw, SAFETY_KEYS)? {
        Some(s) => Some(s),
        None => overall_safety(
            number(raw, FINANCIAL_HEALTH_KEYS)?,
            number(raw, VALUATION_RISK_KEYS)?,
            number(raw, BANKRUPTCY_RISK_KEYS)?,
            number(raw, DILUTION_RISK_KEYS)?,
        ),
    };
    if let Some(s) = safety {
        m.fundamental_safety_score = percent(s);
        supplied.insert(MetricField::FundamentalSafety);
    }
    let coverage = match number(raw, DATA_QUALITY_KEYS)? {
        Some(q) => Some(q),
        None => source_coverage(number(raw, SOURCES_FETCHED_KEYS)?, number(raw, SOURCES_EXPECTED_KEYS)?),
    };
    if let Some(q) = coverage {
        m.data_quality_coverage = percent(q);
        supplied.insert(MetricField::DataQuality);
    }
    if let Some(s) = number(raw, STOCK_SCORE_KEYS)? {
        m.stock_score = percent(s);
        supplied.insert(MetricField::StockScore);
    }
    if let Some(p) = number(raw, PRICE_KEYS)? {
        m.price = non_negative(p);
        supplied.insert(MetricField::Price);
    }

    m.supplied = supplied;
    debug!(supplied = supplied.len(), raw_keys = raw.len(), "normalized metrics");
    Ok(m)
}

/// Confidence in the short-interest estimate, from agreement with the official filing.
fn si_confidence(estimated: Option<f64>, official: Option<f64>) -> Option<f64> {
    match (estimated, official) {
        (None, None) => None,
        (Some(e), Some(o)) => {
            let discrepancy = (e - o).abs();
            Some(if discrepancy < 2.0 {
                95.0
            } else if discrepancy < 5.0 {
                80.0
            } else if discrepancy < 10.0 {
                60.0
            } else {
                30.0
            })
        }
        _ => Some(50.0),
    }
}

/// Percentage of option volume on the call side.
fn call_weighted_sentiment(calls: Option<f64>, puts: Option<f64>) -> Option<f64> {
    let calls = non_negative(calls?);
    let total = calls + non_negative(puts.unwrap_or(0.0));
    (total > 0.0).then(|| (calls / total * 100.0).round())
}

/// Short position over average daily volume. Unknown without a positive volume.
fn days_to_cover(short_shares: Option<f64>, avg_volume: Option<f64>) -> Option<f64> {
    let volume = avg_volume?;
    let short_shares = short_shares?;
    (volume > 0.0).then(|| non_negative(short_shares) / volume)
}

/// Weighted blend of balance-sheet health and the three risk scores (all 0–100).
/// Components that are missing take neutral values; with none present the
/// safety score stays unknown.
fn overall_safety(
    health: Option<f64>,
    valuation_risk: Option<f64>,
    bankruptcy_risk: Option<f64>,
    dilution_risk: Option<f64>,
) -> Option<f64> {
    if health.is_none() && valuation_risk.is_none() && bankruptcy_risk.is_none() && dilution_risk.is_none() {
        return None;
    }
    let health = percent(health.unwrap_or(50.0));
    let valuation_risk = percent(valuation_risk.unwrap_or(50.0));
    let bankruptcy_risk = percent(bankruptcy_risk.unwrap_or(20.0));
    let dilution_risk = percent(dilution_risk.unwrap_or(20.0));
    Some(
        (health * 0.4
            + (100.0 - valuation_risk) * 0.2
            + (100.0 - bankruptcy_risk) * 0.3
            + (100.0 - dilution_risk) * 0.1)
            .round(),
    )
}

/// Share of expected upstream sources that actually returned data.
fn source_coverage(fetched: Option<f64>, expected: Option<f64>) -> Option<f64> {
    let expected = expected?;
    let fetched = fetched?;
    (expected > 0.0).then(|| (non_negative(fetched) / expected * 100.0).round())
}

fn percent(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

fn non_negative(v: f64) -> f64 {
    v.max(0.0)
}

fn count(v: f64) -> u64 {
    v.max(0.0).round() as u64
}

/// First non-null value among `keys`, coerced to a finite number.
fn number(raw: &RawMetrics, keys: &[&str]) -> Result<Option<f64>> {
    for key in keys {
        let value = match raw.get(*key) {
            None | Some(Value::Null) => continue,
            Some(v) => v,
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let s = s.trim().trim_end_matches('%').trim();
                if s.is_empty() {
                    continue;
                }
                s.parse::<f64>().ok()
            }
            other => {
                return Err(AppError::Normalize {
                    key: key.to_string(),
                    reason: format!("expected a number, got {}", kind(other)),
                })
            }
        };
        return match parsed {
            Some(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(AppError::Normalize {
                key: key.to_string(),
                reason: format!("not a finite number: {value}"),
            }),
        };
    }
    Ok(None)
}

/// First non-null trend label among `keys`.
fn label(raw: &RawMetrics, keys: &[&str]) -> Result<Option<CtbTrend>> {
    for key in keys {
        match raw.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) if s.trim().is_empty() => continue,
            Some(Value::String(s)) => return Ok(Some(CtbTrend::from_label(s))),
            Some(other) => {
                return Err(AppError::Normalize {
                    key: key.to_string(),
                    reason: format!("expected a trend label, got {}", kind(other)),
                })
            }
        }
    }
    Ok(None)
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
