//! Error types for result lookups and exports.

use thiserror::Error;

use crate::ResultKind;

/// Result type for summary operations.
pub type Result<T> = std::result::Result<T, SummaryError>;

/// Errors raised while reading or exporting stored results.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Factor is not in the configured list
    #[error("Factor not found: {0}")]
    FactorNotFound(String),

    /// Factor key cannot address a factor
    #[error("Invalid factor key: {0}")]
    InvalidKey(String),

    /// The result has not been computed yet
    #[error("Result not computed: {0}")]
    NotComputed(ResultKind),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// CSV serialization error
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
