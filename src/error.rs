//! Error types for the visa-lead-engine library.
//!
//! Classification itself never fails. These errors come from the edges:
//! the lead store, the completion API, configuration and input parsing.

use thiserror::Error;

/// Errors that can occur in the visa-lead-engine application.
#[derive(Error, Debug)]
pub enum LeadEngineError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Lead not found
    #[error("Lead not found: {0}")]
    LeadNotFound(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Country table parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Pattern compilation errors
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Result with LeadEngineError
pub type Result<T> = std::result::Result<T, LeadEngineError>;

impl From<anyhow::Error> for LeadEngineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
