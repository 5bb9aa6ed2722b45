use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A raw provider field had a shape the normalizer cannot coerce (e.g. an object
    /// where a number was expected). Missing or null fields never produce this.
    #[error("Malformed metric `{key}`: {reason}")]
    Normalize { key: String, reason: String },

    #[error("Upstream data error: {0}")]
    Upstream(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
