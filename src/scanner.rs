use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::{DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE};
use crate::engine::{now_ns, SqueezeEngine};
use crate::source::MetricsSource;
use crate::state::{AlertFeed, FeedEntry, ResultStore};
use crate::summary::ScanFilters;
use crate::types::{ScanResult, Summary};

/// Leaders logged after each cycle.
const CYCLE_LEADERS: usize = 3;

/// Point-in-time view of everything the scanner has seen.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub summary: Summary,
    /// Latest result per symbol that passes the filters, best score first.
    pub results: Vec<ScanResult>,
    /// Newest alerts first.
    pub recent_alerts: Vec<FeedEntry>,
}

/// Scans symbols in fixed-size batches. Symbols inside a batch are fetched and
/// evaluated concurrently; batches run one after another with a pause between
/// them so upstream rate limits are respected.
pub struct BatchScanner {
    engine: Arc<SqueezeEngine>,
    source: Arc<dyn MetricsSource>,
    store: Arc<ResultStore>,
    feed: Arc<AlertFeed>,
    batch_size: usize,
    batch_delay: Duration,
}

impl BatchScanner {
    pub fn new(
        engine: Arc<SqueezeEngine>,
        source: Arc<dyn MetricsSource>,
        store: Arc<ResultStore>,
        feed: Arc<AlertFeed>,
    ) -> Self {
        Self {
            engine,
            source,
            store,
            feed,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
        }
    }

    pub fn with_batching(mut self, batch_size: usize, batch_delay: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.batch_delay = batch_delay;
        self
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    pub fn feed(&self) -> &Arc<AlertFeed> {
        &self.feed
    }

    /// One result per input symbol, in input order. Never fails: a symbol whose
    /// fetch or normalization fails yields the ERROR sentinel.
    pub async fn scan(&self, symbols: &[String]) -> Vec<ScanResult> {
        let mut results = Vec::with_capacity(symbols.len());
        for (i, batch) in symbols.chunks(self.batch_size).enumerate() {
            if i > 0 && !self.batch_delay.is_zero() {
                sleep(self.batch_delay).await;
            }
            let futures: Vec<_> = batch.iter().map(|s| self.scan_symbol(s)).collect();
            results.extend(join_all(futures).await);
        }
        results
    }

    async fn scan_symbol(&self, symbol: &str) -> ScanResult {
        let outcome = match self.source.fetch(symbol).await {
            Ok(raw) => self.engine.evaluate(symbol, &raw),
            Err(e) => Err(e),
        };

        let result = match outcome {
            Ok(r) => {
                info!(
                    symbol,
                    score = r.score.score,
                    tier = %r.score.tier,
                    classification = %r.classification.squeeze_type,
                    timing = %r.classification.timing,
                    alerts = r.alerts.len(),
                    "scanned"
                );
                r
            }
            Err(e) => {
                warn!(symbol, source = self.source.name(), "scan failed: {e}");
                self.engine.error_result(symbol, &e.to_string(), now_ns())
            }
        };

        self.store.upsert(result.clone());
        self.feed.record(&result);
        result
    }

    /// Scan, filter, summarize and log one full cycle.
    pub async fn run_cycle(&self, symbols: &[String], filters: &ScanFilters) -> (Vec<ScanResult>, Summary) {
        let cycle_start = now_ns();
        let scanned = self.scan(symbols).await;
        let errors = scanned.iter().filter(|r| r.is_error()).count();
        let kept = if filters.is_empty() { scanned } else { filters.apply(&scanned) };
        let summary = self.engine.summarize(&kept);

        info!(
            "[CYCLE] {} symbols ({} errors, {} kept): legendary={} strong={} moderate={} weak={} avoid={} avg_score={} alerts={} imminent={}",
            symbols.len(),
            errors,
            summary.total,
            summary.legendary,
            summary.strong,
            summary.moderate,
            summary.weak,
            summary.avoid,
            summary.average_score,
            summary.alert_count,
            summary.imminent_count,
        );

        for entry in self
            .feed
            .recent(self.feed.len())
            .iter()
            .take_while(|e| e.timestamp_ns >= cycle_start)
        {
            info!(
                symbol = %entry.symbol,
                level = %entry.alert.level,
                alert = %entry.alert.alert_type,
                value = entry.alert.value,
                "[ALERT] {}",
                entry.alert.message
            );
        }
        for (rank, r) in self.store.snapshot().iter().take(CYCLE_LEADERS).enumerate() {
            info!(
                "[TOP {}] {} score={} {} {}",
                rank + 1,
                r.symbol,
                r.score.score,
                r.classification.squeeze_type,
                r.classification.timing
            );
        }
        (kept, summary)
    }

    /// Latest stored result for every symbol scanned so far, filtered and
    /// summarized, plus up to `alert_limit` of the newest alerts.
    pub fn report(&self, filters: &ScanFilters, alert_limit: usize) -> ScanReport {
        let results = filters.apply(&self.store.snapshot());
        ScanReport {
            summary: self.engine.summarize(&results),
            results,
            recent_alerts: self.feed.recent(alert_limit),
        }
    }

    /// Repeat `run_cycle` every `every` (at least one second). The first cycle
    /// starts immediately.
    pub async fn run(self, symbols: Vec<String>, every: Duration, filters: ScanFilters) {
        let mut ticker = interval(every.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle(&symbols, &filters).await;
        }
    }
}
