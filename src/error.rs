//! Error types for the persistence adapter

use thiserror::Error;

/// Persistence adapter error
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Adapter or application configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation called without a map identifier
    #[error("Map id can not be empty")]
    MissingMapId,

    /// Save called outside of a Tokio runtime
    #[error("No Tokio runtime available to dispatch the save")]
    NoRuntime,

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered a load with a non-success status
    #[error("load error: {status}, {status_text}")]
    Load { status: u16, status_text: String },

    /// Map document could not be parsed or written
    #[error("Document error: {0}")]
    Document(String),

    /// Config file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, PersistenceError>;
