//! Error types for Botline
//!
//! Defines a single error enum covering all failure modes across the system.
//! Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Result type alias for Botline operations
pub type Result<T> = std::result::Result<T, BotlineError>;

/// Comprehensive error type for Botline operations
#[derive(Error, Debug)]
pub enum BotlineError {
    /// Request was well-formed but semantically invalid
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller presented no key, or a key that proves nothing here
    #[error("Unauthorized")]
    Unauthorized,

    /// Referenced bot, room, or message does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// API client errors
    #[error("Client error: {0}")]
    Client(#[from] botline_client::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
