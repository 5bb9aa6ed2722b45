use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::error::{AppError, Result};
use crate::normalizer::RawMetrics;
use crate::source::MetricsSource;

/// Replays raw payloads from a JSON document of the form
/// `{ "GME": { ...raw metrics... }, "AMC": { ... } }`.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    payloads: HashMap<String, RawMetrics>,
}

impl FileSource {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let source = Self::from_json(&text)?;
        info!("Loaded {} symbols from {}", source.payloads.len(), path.display());
        Ok(source)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let parsed: HashMap<String, RawMetrics> = serde_json::from_str(text)?;
        Ok(Self::from_map(parsed))
    }

    /// Symbol keys are matched case-insensitively.
    pub fn from_map(payloads: HashMap<String, RawMetrics>) -> Self {
        let payloads = payloads
            .into_iter()
            .map(|(symbol, raw)| (symbol.trim().to_uppercase(), raw))
            .collect();
        Self { payloads }
    }

    /// Symbols present in the document, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.payloads.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

#[async_trait]
impl MetricsSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self, symbol: &str) -> Result<RawMetrics> {
        self.payloads
            .get(&symbol.trim().to_uppercase())
            .cloned()
            .ok_or_else(|| AppError::Upstream(format!("no data for {symbol}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "gme": { "short_interest": 24.1, "utilization": 96 },
        "AMC": {}
    }"#;

    #[tokio::test]
    async fn fetch_matches_case_insensitively() {
        let src = FileSource::from_json(DOC).unwrap();
        assert_eq!(src.symbols(), vec!["AMC".to_string(), "GME".to_string()]);

        let gme = src.fetch("GME").await.unwrap();
        assert_eq!(gme.get("utilization").and_then(|v| v.as_f64()), Some(96.0));
        assert!(src.fetch("amc").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_symbol_is_upstream_error() {
        let src = FileSource::from_json(DOC).unwrap();
        let err = src.fetch("TSLA").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(
            FileSource::from_json(r#"{ "GME": [1, 2] }"#),
            Err(AppError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = FileSource::load("/nonexistent/squeeze-input.json").unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
