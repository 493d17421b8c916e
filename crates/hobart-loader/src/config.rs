//! Configuration for loader behaviour.

use polars::prelude::{Expr, Label};
use serde::{Deserialize, Serialize};

/// Default column holding the trading day of each row.
pub const DAILY_COL: &str = "trading_date";

/// Settings applied when a [`DataLoader`](crate::DataLoader) parses expressions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wrap multi-output selections into a single struct column named after the first root
    /// column.
    pub auto_structify: bool,
}

impl EngineConfig {
    /// Creates a config with the given structify switch.
    pub const fn new(auto_structify: bool) -> Self {
        Self { auto_structify }
    }
}

/// Options for [`DataLoader::group_by_time`](crate::DataLoader::group_by_time).
#[derive(Debug, Clone)]
pub struct GroupByTimeOpt<'a> {
    /// Column whose last value is reported per bucket
    pub last_time: Option<&'a str>,
    /// Time column windows are computed on
    pub time: &'a str,
    /// Extra grouping keys
    pub group_by: Option<&'a [Expr]>,
    /// Column marking the trading day, used by the `"daily"` rule
    pub daily_col: &'a str,
    /// Keep groups in order of first appearance
    pub maintain_order: bool,
    /// Window edge used as the bucket label
    pub label: Label,
}

impl Default for GroupByTimeOpt<'_> {
    fn default() -> Self {
        Self {
            last_time: None,
            time: "time",
            group_by: None,
            daily_col: DAILY_COL,
            maintain_order: true,
            label: Label::Left,
        }
    }
}

impl<'a> GroupByTimeOpt<'a> {
    /// Sets the time column.
    pub const fn time(mut self, time: &'a str) -> Self {
        self.time = time;
        self
    }

    /// Sets the daily marker column.
    pub const fn daily_col(mut self, daily_col: &'a str) -> Self {
        self.daily_col = daily_col;
        self
    }

    /// Sets extra grouping keys.
    pub const fn group_by(mut self, by: &'a [Expr]) -> Self {
        self.group_by = Some(by);
        self
    }

    /// Sets the column reported by its last value.
    pub const fn last_time(mut self, last_time: &'a str) -> Self {
        self.last_time = Some(last_time);
        self
    }

    /// Sets whether group order follows first appearance.
    pub const fn maintain_order(mut self, maintain_order: bool) -> Self {
        self.maintain_order = maintain_order;
        self
    }

    /// Sets the label edge.
    pub const fn label(mut self, label: Label) -> Self {
        self.label = label;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opt = GroupByTimeOpt::default();
        assert_eq!(opt.time, "time");
        assert_eq!(opt.daily_col, DAILY_COL);
        assert!(opt.maintain_order);
        assert!(opt.group_by.is_none());
        assert!(!EngineConfig::default().auto_structify);
    }

    #[test]
    fn test_engine_config_serde() {
        let json = serde_json::to_string(&EngineConfig::new(true)).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert!(back.auto_structify);
    }
}
