//! Error types for loader operations.

use thiserror::Error;

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while building or transforming a [`DataLoader`](crate::DataLoader).
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Symbol list and frame list have different lengths
    #[error("Symbol count {symbols} does not match frame count {frames}")]
    SymbolMismatch {
        /// Number of symbols supplied
        symbols: usize,
        /// Number of frames supplied
        frames: usize,
    },

    /// A symbol appears more than once
    #[error("Duplicate symbol: {0}")]
    DuplicateSymbol(String),

    /// A per-symbol transform failed
    #[error("Transform failed for symbol {symbol}: {source}")]
    Transform {
        /// Symbol whose frame failed
        symbol: String,
        /// Underlying failure
        #[source]
        source: Box<Self>,
    },

    /// Frames cannot be aligned or combined row by row
    #[error("Cannot align frame {frame}: {reason}")]
    Alignment {
        /// Index of the offending frame
        frame: usize,
        /// Why alignment failed
        reason: String,
    },

    /// Symbol is not held by the loader
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Index is past the end of the loader
    #[error("Index {index} out of range for loader of length {len}")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Number of frames held
        len: usize,
    },

    /// Unsupported option
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Path does not name a loadable location
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoaderError {
    /// Wraps an error with the symbol whose frame produced it.
    pub fn for_symbol(symbol: impl Into<String>, err: impl Into<Self>) -> Self {
        Self::Transform { symbol: symbol.into(), source: Box::new(err.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_error_names_symbol() {
        let err = LoaderError::for_symbol("BTC", LoaderError::Unsupported("cross join".into()));
        let msg = err.to_string();
        assert!(msg.contains("BTC"));
        assert!(msg.contains("cross join"));
    }

    #[test]
    fn test_mismatch_message() {
        let err = LoaderError::SymbolMismatch { symbols: 2, frames: 3 };
        assert_eq!(err.to_string(), "Symbol count 2 does not match frame count 3");
    }
}
