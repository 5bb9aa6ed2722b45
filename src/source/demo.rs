use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};

use crate::error::Result;
use crate::normalizer::RawMetrics;
use crate::source::MetricsSource;

/// Reference prices for well-known tickers; other symbols get a random base.
const BASE_PRICES: &[(&str, f64)] = &[
    ("AAPL", 195.0),
    ("TSLA", 245.0),
    ("GME", 18.0),
    ("AMC", 4.5),
    ("BBBY", 0.3),
    ("NVDA", 485.0),
    ("MSFT", 375.0),
    ("GOOGL", 165.0),
    ("AMZN", 145.0),
    ("META", 485.0),
    ("SPCE", 2.1),
    ("PLTR", 24.0),
    ("NIO", 8.5),
    ("BABA", 95.0),
    ("NFLX", 485.0),
];

/// Synthetic but internally consistent market data. Output is a pure function
/// of (symbol, time bucket): values drift once per bucket and are stable within it.
#[derive(Debug, Clone)]
pub struct DemoSource {
    bucket_secs: u64,
    fixed_bucket: Option<u64>,
}

impl DemoSource {
    pub fn new() -> Self {
        Self { bucket_secs: 60, fixed_bucket: None }
    }

    /// Pin the time bucket so every fetch returns the same payload.
    pub fn with_fixed_bucket(mut self, bucket: u64) -> Self {
        self.fixed_bucket = Some(bucket);
        self
    }

    fn current_bucket(&self) -> u64 {
        self.fixed_bucket.unwrap_or_else(|| {
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            secs / self.bucket_secs.max(1)
        })
    }

    /// Generate the payload for `symbol` in time bucket `bucket`.
    pub fn generate(&self, symbol: &str, bucket: u64) -> RawMetrics {
        let mut rng = ChaCha8Rng::seed_from_u64(seed(symbol, bucket));

        let short_interest: f64 = rng.gen_range(5.0..35.0);
        let utilization = rng.gen_range(60.0..98.0_f64).min(99.8);
        let cost_to_borrow = rng.gen_range(5.0..short_interest * 3.0).min(300.0);
        let days_to_cover = rng.gen_range(0.5..short_interest / 3.0).min(15.0);
        let free_float: u64 = rng.gen_range(20_000_000..=500_000_000);
        let outstanding = (free_float as f64 * rng.gen_range(1.2..3.0)).round();

        let trend = if cost_to_borrow > 50.0 {
            "EXPLODING"
        } else if cost_to_borrow > 20.0 {
            "RISING"
        } else if cost_to_borrow > 10.0 {
            "STABLE"
        } else {
            "FALLING"
        };

        let base_price = BASE_PRICES
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, p)| *p)
            .unwrap_or_else(|| rng.gen_range(5.0..100.0));
        let price = base_price * (1.0 + rng.gen_range(-0.05..0.05));

        let payload = json!({
            "short_interest_pct": round2(short_interest),
            "short_interest_confidence": rng.gen_range(75..=98),
            "utilization_pct": round1(utilization),
            "available_shares": rng.gen_range(1_000..=50_000),
            "cost_to_borrow_pct": round2(cost_to_borrow),
            "cost_to_borrow_trend": trend,
            "days_to_cover": round2(days_to_cover),
            "free_float": free_float,
            "shares_outstanding": outstanding,
            "stock_score": rng.gen_range(0..=100),
            "fundamental_safety_score": rng.gen_range(20..=95),
            "data_quality_coverage": rng.gen_range(80..=99),
            "flow_sentiment": round1(rng.gen_range(-50.0..80.0)),
            "unusual_activity_multiplier": round1(rng.gen_range(0.5..8.0)),
            "price": round2(price),
        });

        match payload {
            Value::Object(map) => map,
            _ => RawMetrics::new(),
        }
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for DemoSource {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn fetch(&self, symbol: &str) -> Result<RawMetrics> {
        Ok(self.generate(symbol, self.current_bucket()))
    }
}

fn seed(symbol: &str, bucket: u64) -> u64 {
    let symbol_hash = symbol
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x100_0000_01b3));
    symbol_hash ^ bucket.wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use crate::types::{CtbTrend, MetricField};

    #[test]
    fn same_symbol_and_bucket_is_reproducible() {
        let src = DemoSource::new();
        assert_eq!(src.generate("GME", 100), src.generate("GME", 100));
        assert_ne!(src.generate("GME", 100), src.generate("GME", 101));
        assert_ne!(src.generate("GME", 100), src.generate("AMC", 100));
    }

    #[test]
    fn generated_payload_normalizes_within_ranges() {
        let src = DemoSource::new();
        for bucket in 0..50 {
            let m = normalize(&src.generate("TSLA", bucket)).unwrap();
            assert!((5.0..=35.0).contains(&m.short_interest_pct));
            assert!((60.0..=99.8).contains(&m.utilization_pct));
            assert!(m.cost_to_borrow_pct <= 300.0);
            assert!(m.days_to_cover <= 15.0);
            assert!(m.shares_outstanding > m.free_float);
            assert!((0.0..=100.0).contains(&m.flow_sentiment));
            assert!(m.price > 0.0);
            assert!(m.is_supplied(MetricField::CostToBorrowTrend));
            let expected_trend = if m.cost_to_borrow_pct > 50.0 {
                CtbTrend::Exploding
            } else if m.cost_to_borrow_pct > 20.0 {
                CtbTrend::Rising
            } else if m.cost_to_borrow_pct > 10.0 {
                CtbTrend::Stable
            } else {
                CtbTrend::Falling
            };
            assert_eq!(m.cost_to_borrow_trend, expected_trend);
        }
    }

    #[test]
    fn known_symbols_trade_near_reference_price() {
        let m = normalize(&DemoSource::new().generate("AAPL", 3)).unwrap();
        assert!((185.0..=205.0).contains(&m.price), "price={}", m.price);
    }

    #[tokio::test]
    async fn fixed_bucket_fetches_are_stable() {
        let src = DemoSource::new().with_fixed_bucket(9);
        let a = src.fetch("NIO").await.unwrap();
        let b = src.fetch("NIO").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a, src.generate("NIO", 9));
    }
}
