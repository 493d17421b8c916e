#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod exprs;
pub mod half_life;
pub mod horizon;

pub use analysis::{FactorAnalysis, FactorAnalysisBuilder};
pub use config::{AnalysisConfig, CorrMethod, DEFAULT_LABEL_PERIODS};
pub use error::{AnalysisError, Result};
pub use horizon::HorizonChoice;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
