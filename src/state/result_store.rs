use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::warn;

use crate::config::ALERT_HISTORY_CAPACITY;
use crate::types::{Alert, ScanResult};

// ---------------------------------------------------------------------------
// ResultStore
// ---------------------------------------------------------------------------

/// Latest scan result per symbol, shared between the scan loop and readers.
pub struct ResultStore {
    /// symbol → most recent result
    results: DashMap<String, ScanResult>,
}

impl ResultStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { results: DashMap::new() })
    }

    /// Insert or replace the entry for `result.symbol`. A result older than the
    /// stored one is dropped. Returns whether the store changed.
    pub fn upsert(&self, result: ScanResult) -> bool {
        match self.results.entry(result.symbol.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().timestamp_ns > result.timestamp_ns {
                    return false;
                }
                slot.insert(result);
            }
            Entry::Vacant(slot) => {
                slot.insert(result);
            }
        }
        true
    }

    pub fn get(&self, symbol: &str) -> Option<ScanResult> {
        self.results.get(symbol).map(|r| r.clone())
    }

    /// All results, highest score first, ties broken by symbol.
    pub fn snapshot(&self) -> Vec<ScanResult> {
        let mut all: Vec<ScanResult> = self.results.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| {
            b.score.score
                .cmp(&a.score.score)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

// ---------------------------------------------------------------------------
// AlertFeed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    pub symbol: String,
    pub timestamp_ns: u64,
    pub alert: Alert,
}

/// Bounded history of emitted alerts. Oldest entries fall off first.
pub struct AlertFeed {
    capacity: usize,
    inner: Mutex<VecDeque<FeedEntry>>,
}

impl AlertFeed {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// A panic while holding the lock leaves the queue itself intact, so a
    /// poisoned lock is logged and recovered rather than dropping alerts.
    fn entries(&self) -> MutexGuard<'_, VecDeque<FeedEntry>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Alert feed lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Record every alert carried by `result`.
    pub fn record(&self, result: &ScanResult) {
        let mut q = self.entries();
        for alert in &result.alerts {
            if q.len() == self.capacity {
                q.pop_front();
            }
            q.push_back(FeedEntry {
                symbol: result.symbol.clone(),
                timestamp_ns: result.timestamp_ns,
                alert: alert.clone(),
            });
        }
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<FeedEntry> {
        self.entries().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AlertFeed {
    fn default() -> Self {
        Self::new(ALERT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SqueezeEngine;
    use crate::types::AlertType;

    fn errored(symbol: &str, ts: u64) -> ScanResult {
        SqueezeEngine::default().error_result(symbol, "down", ts)
    }

    fn scored(symbol: &str, score: u8, ts: u64) -> ScanResult {
        let mut r = errored(symbol, ts);
        r.score.score = score;
        r.error = None;
        r
    }

    #[test]
    fn upsert_keeps_newest() {
        let store = ResultStore::new();
        assert!(store.upsert(scored("GME", 40, 10)));
        assert!(store.upsert(scored("GME", 70, 20)));
        assert!(!store.upsert(scored("GME", 99, 15)));
        assert_eq!(store.get("GME").unwrap().score.score, 70);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn equal_timestamp_replaces() {
        let store = ResultStore::new();
        store.upsert(scored("AMC", 10, 5));
        assert!(store.upsert(scored("AMC", 20, 5)));
        assert_eq!(store.get("AMC").unwrap().score.score, 20);
    }

    #[test]
    fn snapshot_orders_by_score_then_symbol() {
        let store = ResultStore::new();
        store.upsert(scored("TSLA", 50, 1));
        store.upsert(scored("AMC", 80, 1));
        store.upsert(scored("GME", 80, 1));
        let order: Vec<String> = store.snapshot().into_iter().map(|r| r.symbol).collect();
        assert_eq!(order, vec!["AMC", "GME", "TSLA"]);

        assert_eq!(store.len(), 3);
    }

    #[test]
    fn feed_evicts_oldest_beyond_capacity() {
        let feed = AlertFeed::new(3);
        assert!(feed.is_empty());
        for i in 0..5 {
            feed.record(&errored(&format!("S{i}"), i));
        }
        assert_eq!(feed.len(), 3);
        let recent = feed.recent(10);
        let symbols: Vec<&str> = recent.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["S4", "S3", "S2"]);
        assert!(recent.iter().all(|e| e.alert.alert_type == AlertType::ApiError));
        assert_eq!(feed.recent(1).len(), 1);
    }

    #[test]
    fn poisoned_feed_keeps_recording() {
        let feed = Arc::new(AlertFeed::new(10));
        feed.record(&errored("AMC", 1));

        let holder = Arc::clone(&feed);
        let crashed = std::thread::spawn(move || {
            let _guard = holder.inner.lock().unwrap();
            panic!("writer crashed while holding the feed");
        })
        .join();
        assert!(crashed.is_err());
        assert!(feed.inner.is_poisoned());

        feed.record(&errored("GME", 2));
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.recent(1)[0].symbol, "GME");
    }

    #[test]
    fn results_without_alerts_leave_feed_untouched() {
        let feed = AlertFeed::default();
        let mut quiet = scored("NVDA", 30, 1);
        quiet.alerts.clear();
        feed.record(&quiet);
        assert!(feed.is_empty());
    }
}
