//! Error types for the lead qualification bot

use thiserror::Error;

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {

    // =============================
    // Runtime Errors
    // =============================

    #[error("Reference cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Reference source error: {0}")]
    ReferenceSource(String),

    #[error("Lead sink error: {0}")]
    LeadSink(String),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
