//! Error types for Hark.

use thiserror::Error;

/// Library-level error type for Hark operations.
#[derive(Error, Debug)]
pub enum HarkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Video source error: {0}")]
    VideoSource(String),

    #[error("Transcript cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Hark operations.
pub type Result<T> = std::result::Result<T, HarkError>;
