//! Analysis configuration.

use std::collections::HashSet;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{AnalysisError, Result};

/// Horizons, in periods, evaluated when none are given. `1` is always added in front.
pub const DEFAULT_LABEL_PERIODS: [usize; 8] = [10, 30, 60, 120, 240, 480, 720, 1200];

/// Correlation used for IC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrMethod {
    /// Linear correlation
    #[default]
    #[display("pearson")]
    Pearson,
    /// Rank correlation
    #[display("spearman")]
    Spearman,
}

/// Tunables of [`FactorAnalysis`](crate::FactorAnalysis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Label horizons, without the leading `1`
    pub label_periods: Vec<usize>,
    /// Winsorize factors before analysis
    pub drop_peak: bool,
    /// Tail mass clipped on each side by winsorization
    pub winsor_quantile: f64,
    /// Absolute bound applied to every correlation
    pub ic_bound: f64,
    /// Number of factor buckets
    pub group: usize,
    /// One-way transaction cost rate
    pub c_rate: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            label_periods: DEFAULT_LABEL_PERIODS.to_vec(),
            drop_peak: true,
            winsor_quantile: 0.025,
            ic_bound: 0.2,
            group: 10,
            c_rate: 3e-4,
        }
    }
}

impl AnalysisConfig {
    /// Checks every field is usable.
    pub fn validate(&self) -> Result<()> {
        if self.label_periods.is_empty() {
            return Err(AnalysisError::InvalidConfig("label_periods is empty".into()));
        }
        if self.label_periods.contains(&0) {
            return Err(AnalysisError::InvalidConfig("label period 0".into()));
        }
        let mut seen = HashSet::with_capacity(self.label_periods.len());
        if let Some(n) = self.label_periods.iter().find(|&&n| !seen.insert(n)) {
            return Err(AnalysisError::InvalidConfig(format!("label period {n} given twice")));
        }
        if !(self.winsor_quantile > 0.0 && self.winsor_quantile < 0.5) {
            return Err(AnalysisError::InvalidConfig(format!(
                "winsor_quantile {} outside (0, 0.5)",
                self.winsor_quantile
            )));
        }
        if self.ic_bound <= 0.0 || self.ic_bound.is_nan() {
            return Err(AnalysisError::InvalidConfig(format!("ic_bound {}", self.ic_bound)));
        }
        if self.group < 2 {
            return Err(AnalysisError::InvalidConfig(format!("group {} below 2", self.group)));
        }
        if self.c_rate < 0.0 || self.c_rate.is_nan() {
            return Err(AnalysisError::InvalidConfig(format!("c_rate {}", self.c_rate)));
        }
        Ok(())
    }

    /// Horizons actually evaluated: `1` followed by the configured ones, duplicates of `1`
    /// removed.
    pub fn periods(&self) -> Vec<usize> {
        std::iter::once(1).chain(self.label_periods.iter().copied().filter(|&n| n != 1)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_periods() {
        let periods = AnalysisConfig::default().periods();
        assert_eq!(periods, vec![1, 10, 30, 60, 120, 240, 480, 720, 1200]);
    }

    #[rstest]
    #[case(AnalysisConfig { label_periods: vec![], ..Default::default() })]
    #[case(AnalysisConfig { label_periods: vec![5, 0], ..Default::default() })]
    #[case(AnalysisConfig { label_periods: vec![5, 5], ..Default::default() })]
    #[case(AnalysisConfig { winsor_quantile: 0.5, ..Default::default() })]
    #[case(AnalysisConfig { ic_bound: 0.0, ..Default::default() })]
    #[case(AnalysisConfig { group: 1, ..Default::default() })]
    #[case(AnalysisConfig { c_rate: -1.0, ..Default::default() })]
    fn test_invalid_configs(#[case] config: AnalysisConfig) {
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"group": 20}"#).unwrap();
        assert_eq!(config.group, 20);
        assert!(config.drop_peak);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_leading_one_not_duplicated() {
        let config = AnalysisConfig { label_periods: vec![1, 5], ..Default::default() };
        assert_eq!(config.periods(), vec![1, 5]);
    }
}
