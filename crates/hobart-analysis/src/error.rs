//! Error types for the analysis engine.

use thiserror::Error;

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised by [`FactorAnalysis`](crate::FactorAnalysis).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Loader error
    #[error(transparent)]
    Loader(#[from] hobart_loader::LoaderError),

    /// Result store error
    #[error(transparent)]
    Summary(#[from] hobart_output::SummaryError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Configuration rejected
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Grouped returns for a factor have no rows
    #[error("No grouped returns for factor {0}")]
    EmptyGroupReturns(String),
}

impl AnalysisError {
    /// True when the error is a lookup of a factor outside the configured list.
    pub const fn is_factor_not_found(&self) -> bool {
        matches!(self, Self::Summary(hobart_output::SummaryError::FactorNotFound(_)))
    }
}
