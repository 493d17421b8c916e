#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod export;
pub mod metric;
pub mod summary;

pub use error::{Result, SummaryError};
pub use export::{ExportFormat, Exporter, IcRecord, to_ascii_table};
pub use metric::{IcStats, Metric};
pub use summary::{FAC_COL, FacSummary, FactorKey, ResultKind, ResultRef, Summary};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
