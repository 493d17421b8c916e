//! Best-horizon selection from grouped returns.

use hobart_output::FactorKey;
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::{AnalysisError, FactorAnalysis, Result};

/// Round-trip cost units charged on a long-short spread: entry and exit on both legs.
const COST_UNITS: f64 = 4.0;

/// Outcome of [`FactorAnalysis::group_analyse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonChoice {
    /// Factor name
    pub factor: String,
    /// Horizon with the largest net spread
    pub best_period: usize,
    /// Net per-period spread at `best_period`
    pub best_ret: f64,
    /// Net per-period spread of every horizon, in horizon order
    pub spreads: Vec<(usize, Option<f64>)>,
    /// Factor half-life, in periods
    pub half_life: Option<f64>,
}

/// Per-period top-minus-bottom spread net of costs, for each horizon.
///
/// `first` and `last` hold the bottom and top bucket's mean label per horizon.
pub fn net_spreads(
    periods: &[usize],
    first: &[Option<f64>],
    last: &[Option<f64>],
    c_rate: f64,
) -> Vec<(usize, Option<f64>)> {
    periods
        .iter()
        .zip(first.iter().zip(last))
        .map(|(&n, (lo, hi))| {
            let n_f = n as f64;
            let spread = match (lo, hi) {
                (Some(lo), Some(hi)) => Some(hi / n_f - lo / n_f - COST_UNITS * c_rate / n_f),
                _ => None,
            };
            (n, spread.filter(|s| !s.is_nan()))
        })
        .collect()
}

/// First horizon with the largest spread. Missing spreads are skipped.
pub fn best_horizon(spreads: &[(usize, Option<f64>)]) -> Option<(usize, f64)> {
    spreads.iter().fold(None, |best, &(n, spread)| match (best, spread) {
        (None, Some(s)) => Some((n, s)),
        (Some((_, b)), Some(s)) if s > b => Some((n, s)),
        (best, _) => best,
    })
}

impl FactorAnalysis {
    /// Picks the horizon whose top-minus-bottom bucket spread, net of costs, is largest.
    ///
    /// Reads the grouped returns from [`group_ret`](Self::group_ret), which must have run for
    /// this factor. Each horizon's bucket means are turned into per-period rates and charged four
    /// times `c_rate / n`. Ties keep the shorter horizon. Computes the half-life if needed.
    pub fn group_analyse(
        &mut self,
        fac: impl Into<FactorKey>,
        c_rate: Option<f64>,
    ) -> Result<HorizonChoice> {
        let c_rate = c_rate.unwrap_or(self.config().c_rate);
        self.half_life()?;
        let summary = self.summary();
        let fs = summary.fac(fac)?;
        let factor = fs.name().to_string();
        let group_rets = fs.group_rets()?;
        let height = group_rets.height();
        if height == 0 {
            return Err(AnalysisError::EmptyGroupReturns(factor));
        }
        let mut first = Vec::with_capacity(self.labels().len());
        let mut last = Vec::with_capacity(self.labels().len());
        for label in self.labels() {
            let column = group_rets.column(label)?.cast(&DataType::Float64)?;
            let values = column.f64()?;
            first.push(values.get(0));
            last.push(values.get(height - 1));
        }
        let spreads = net_spreads(self.periods(), &first, &last, c_rate);
        let (best_period, best_ret) =
            best_horizon(&spreads).ok_or_else(|| AnalysisError::EmptyGroupReturns(factor.clone()))?;
        let half_life = fs.half_life()?;
        info!(factor = %factor, best_period, best_ret, half_life, "best horizon");
        Ok(HorizonChoice { factor, best_period, best_ret, spreads, half_life })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_net_spreads() {
        let spreads = net_spreads(&[1, 10], &[Some(-0.001), Some(-0.02)], &[Some(0.002), Some(0.05)], 3e-4);
        assert_relative_eq!(spreads[0].1.unwrap(), 0.003 - 12e-4, epsilon = 1e-15);
        assert_relative_eq!(spreads[1].1.unwrap(), 0.007 - 12e-5, epsilon = 1e-15);
    }

    #[test]
    fn test_best_horizon_keeps_first_maximum() {
        let spreads = vec![(1, Some(0.1)), (10, None), (30, Some(0.3)), (60, Some(0.3))];
        assert_eq!(best_horizon(&spreads), Some((30, 0.3)));
        assert_eq!(best_horizon(&[(1, None)]), None);
    }
}
