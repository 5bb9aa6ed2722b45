use crate::error::{AppError, Result};

/// Symbols scanned when SCANNER_SYMBOLS is not set.
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "GME", "AMC", "TSLA", "NVDA", "PLTR", "SPCE", "NIO", "BBBY", "AAPL", "NFLX",
];

/// Symbols evaluated concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Pause between batches so upstream providers are not hammered.
pub const DEFAULT_BATCH_DELAY_MS: u64 = 2_000;

/// Full scan cycle interval (seconds).
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

/// Alerts retained by the rolling alert feed.
pub const ALERT_HISTORY_CAPACITY: usize = 100;

/// Number of classifications reported in the summary leaderboard.
pub const TOP_CLASSIFICATIONS: usize = 5;

/// Composite score tier boundaries (inclusive lower bounds).
pub mod tier_thresholds {
    pub const LEGENDARY_MIN: u8 = 90;
    pub const STRONG_MIN: u8 = 85;
    pub const MODERATE_MIN: u8 = 75;
    pub const WEAK_MIN: u8 = 60;
}

/// Defaults substituted by the normalizer when a provider field is absent.
pub mod metric_defaults {
    pub const FLOW_SENTIMENT: f64 = 50.0;
    pub const UNUSUAL_ACTIVITY_MULTIPLIER: f64 = 1.0;
    pub const FUNDAMENTAL_SAFETY: f64 = 50.0;
    pub const STOCK_SCORE: f64 = 50.0;
    pub const CTB_ACCELERATION: f64 = 1.0;
}

/// Scoring formula selected by SCORING_PRESET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringPreset {
    Points,
    Linear,
}

impl std::str::FromStr for ScoringPreset {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "points" => Ok(ScoringPreset::Points),
            "linear" => Ok(ScoringPreset::Linear),
            other => Err(AppError::Config(format!(
                "SCORING_PRESET must be `points` or `linear`, got `{other}`"
            ))),
        }
    }
}

impl std::fmt::Display for ScoringPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringPreset::Points => write!(f, "points"),
            ScoringPreset::Linear => write!(f, "linear"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Symbols to scan each cycle (SCANNER_SYMBOLS, comma-separated). When unset the
    /// input file's symbols are used, then DEFAULT_SYMBOLS.
    pub symbols: Option<Vec<String>>,
    /// Symbols per concurrent batch (SCANNER_BATCH_SIZE)
    pub batch_size: usize,
    /// Delay between batches in ms (SCANNER_BATCH_DELAY_MS)
    pub batch_delay_ms: u64,
    /// Seconds between full scan cycles (SCAN_INTERVAL_SECS)
    pub scan_interval_secs: u64,
    /// Run a single cycle, print the summary as JSON and exit (SCANNER_ONCE)
    pub once: bool,
    pub preset: ScoringPreset,
    /// Overrides the preset's DATA_DISCREPANCY threshold (DISCREPANCY_ALERT_THRESHOLD)
    pub discrepancy_threshold: Option<f64>,
    /// JSON file of symbol → raw metrics. Demo data is generated when unset (SCANNER_INPUT_FILE)
    pub input_file: Option<String>,
    /// Results below this score are left out of the cycle summary (SCANNER_MIN_SCORE)
    pub min_score: Option<u8>,
    pub alert_history_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            symbols: Some(parse_symbols(&std::env::var("SCANNER_SYMBOLS").unwrap_or_default()))
                .filter(|s| !s.is_empty()),
            batch_size: parse_or("SCANNER_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            batch_delay_ms: parse_or("SCANNER_BATCH_DELAY_MS", DEFAULT_BATCH_DELAY_MS)?,
            scan_interval_secs: parse_or("SCAN_INTERVAL_SECS", DEFAULT_SCAN_INTERVAL_SECS)?,
            once: parse_or("SCANNER_ONCE", false)?,
            preset: parse_or("SCORING_PRESET", ScoringPreset::Points)?,
            discrepancy_threshold: parse_opt("DISCREPANCY_ALERT_THRESHOLD")?,
            input_file: std::env::var("SCANNER_INPUT_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            min_score: parse_opt("SCANNER_MIN_SCORE")?,
            alert_history_capacity: parse_or("ALERT_HISTORY_CAPACITY", ALERT_HISTORY_CAPACITY)?,
        })
    }
}

/// Splits a comma-separated symbol list, upper-casing and dropping blanks.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Symbols for a scan cycle: the configured list, else whatever the data
/// source can serve, else DEFAULT_SYMBOLS.
pub fn resolve_symbols(configured: Option<Vec<String>>, available: Option<Vec<String>>) -> Vec<String> {
    configured
        .or(available)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    Ok(parse_opt(key)?.unwrap_or(default))
}

fn parse_opt<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: `{v}`"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_trimmed_and_uppercased() {
        assert_eq!(parse_symbols(" gme, amc ,,tsla"), vec!["GME", "AMC", "TSLA"]);
    }

    #[test]
    fn blank_symbol_list_parses_empty() {
        assert!(parse_symbols("  , ,").is_empty());
    }

    #[test]
    fn configured_symbols_beat_source_symbols() {
        let configured = Some(vec!["GME".to_string()]);
        let available = Some(vec!["AMC".to_string(), "TSLA".to_string()]);
        assert_eq!(resolve_symbols(configured, available.clone()), vec!["GME"]);
        assert_eq!(resolve_symbols(None, available), vec!["AMC", "TSLA"]);
    }

    #[test]
    fn defaults_apply_when_nothing_else_is_known() {
        assert_eq!(resolve_symbols(None, None).len(), DEFAULT_SYMBOLS.len());
        assert_eq!(resolve_symbols(None, Some(Vec::new())).len(), DEFAULT_SYMBOLS.len());
    }

    #[test]
    fn preset_parses_case_insensitively() {
        assert_eq!("Linear".parse::<ScoringPreset>().unwrap(), ScoringPreset::Linear);
        assert_eq!("points".parse::<ScoringPreset>().unwrap(), ScoringPreset::Points);
        assert!("weighted".parse::<ScoringPreset>().is_err());
    }
}
