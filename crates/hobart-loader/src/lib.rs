#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod align;
pub mod config;
pub mod error;
pub mod frame;
pub mod group_by;
pub mod horizontal;
mod io;
pub mod loader;

pub use config::{DAILY_COL, EngineConfig, GroupByTimeOpt};
pub use error::{LoaderError, Result};
pub use frame::Frame;
pub use group_by::DataLoaderGroupBy;
pub use horizontal::{HorizontalAgg, horizontal_agg};
pub use loader::{DataLoader, LoaderSource};

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
