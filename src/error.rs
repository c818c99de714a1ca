//! Error types for the Heatforge optimization loop
//!
//! This module provides structured error definitions using thiserror. Expected
//! "not yet" outcomes of the optimizer (cooldown, insufficient data) are not
//! errors and live in `optimizer::state` instead.

use thiserror::Error;

/// Main error type for Heatforge operations
#[derive(Error, Debug)]
pub enum HeatforgeError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(String),

    /// Site not found
    #[error("Site not found: {0}")]
    SiteNotFound(String),

    /// Interaction event or request payload rejected by validation
    #[error("Invalid interaction: {0}")]
    InvalidInteraction(String),

    /// Content generator has no credentials configured
    #[error("Content generator unavailable: {0}")]
    GeneratorUnavailable(String),

    /// Content generator call failed upstream
    #[error("Content generator error: {0}")]
    Generator(String),

    /// Content generator call exceeded its time budget
    #[error("Content generator timed out after {0} seconds")]
    GeneratorTimeout(u64),

    /// Generator response lacked a parseable markup block
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Protected-section repair could not be applied
    #[error("Structural repair failed: {0}")]
    StructuralRepair(String),

    /// Markup could not be queried (invalid selector, parser failure)
    #[error("Markup query error: {0}")]
    Markup(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl HeatforgeError {
    /// Whether a caller may reasonably retry the operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HeatforgeError::Generator(_)
                | HeatforgeError::GeneratorTimeout(_)
                | HeatforgeError::Extraction(_)
                | HeatforgeError::Http(_)
        )
    }
}

/// Result type alias for Heatforge operations
pub type Result<T> = std::result::Result<T, HeatforgeError>;

impl From<libsql::Error> for HeatforgeError {
    fn from(err: libsql::Error) -> Self {
        HeatforgeError::Database(err.to_string())
    }
}

/// Convert anyhow::Error to HeatforgeError
impl From<anyhow::Error> for HeatforgeError {
    fn from(err: anyhow::Error) -> Self {
        HeatforgeError::Other(err.to_string())
    }
}
