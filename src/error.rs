use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid time {input:?}, it must be in ISO8601 format: {reason}")]
    InvalidTimeFormat { input: String, reason: String },

    #[error("invalid date {input:?}, it must be in YYYY-MM-DD format: {reason}")]
    InvalidDateFormat { input: String, reason: String },

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("sink error: {0}")]
    Sink(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}
