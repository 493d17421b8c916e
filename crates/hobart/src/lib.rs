#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use hobart_analysis as analysis;
pub use hobart_loader as loader;
pub use hobart_output as output;

/// The types most callers need.
pub mod prelude {
    pub use hobart_analysis::{AnalysisConfig, AnalysisError, CorrMethod, FactorAnalysis, HorizonChoice};
    pub use hobart_loader::{DataLoader, Frame, GroupByTimeOpt, HorizontalAgg, LoaderError, LoaderSource};
    pub use hobart_output::{ExportFormat, Exporter, Metric, ResultKind, Summary, SummaryError};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
