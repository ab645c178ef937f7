//! Error types for the Asclepius wellness engine
//!
//! This module provides structured error handling using thiserror for
//! error definitions and anyhow for propagation at the binary edge.

use thiserror::Error;

/// Main error type for Asclepius operations
#[derive(Error, Debug)]
pub enum AsclepiusError {
    /// Reading value violates the parameter's declared bounds.
    /// Rejected outright, never clamped.
    #[error("value {value} for '{parameter}' is outside the declared range [{min}, {max}]")]
    OutOfRange {
        parameter: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Parameter, alert, or user does not exist or does not belong to the caller
    #[error("not found: {0}")]
    NotFound(String),

    /// Percent change is undefined when the first value of a window is zero
    #[error("percent change undefined for a zero baseline")]
    ZeroBaseline,

    /// Database operation failed
    #[error("database error: {0}")]
    Database(String),

    /// Invalid identifier format
    #[error("invalid id: {0}")]
    InvalidId(#[from] uuid::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid operation (e.g., recording against a deactivated parameter)
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Catch-all for unexpected errors
    #[error("{0}")]
    Other(String),
}

impl From<libsql::Error> for AsclepiusError {
    fn from(e: libsql::Error) -> Self {
        AsclepiusError::Database(e.to_string())
    }
}

/// Convenience result type for Asclepius operations
pub type Result<T> = std::result::Result<T, AsclepiusError>;
