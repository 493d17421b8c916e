//! Named metrics derived from stored results.

use derive_more::Display;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// A metric resolvable by name on a [`Summary`](crate::Summary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Mean of the time-series IC
    #[display("ic")]
    Ic,
    /// Sample standard deviation of the time-series IC
    #[display("ic_std")]
    IcStd,
    /// Information ratio, `ic / ic_std`
    #[display("ir")]
    Ir,
    /// Skewness of the time-series IC
    #[display("ic_skew")]
    IcSkew,
    /// Excess kurtosis of the time-series IC
    #[display("ic_kurt")]
    IcKurt,
    /// Count-weighted cross-symbol IC over the whole sample
    #[display("ic_overall")]
    IcOverall,
}

impl Metric {
    /// Every metric, in reporting order.
    pub const ALL: [Self; 6] =
        [Self::Ic, Self::IcStd, Self::Ir, Self::IcSkew, Self::IcKurt, Self::IcOverall];

    /// Resolves a metric name. Unknown names give `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.to_string() == name)
    }
}

/// Moments of one IC series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IcStats {
    /// Mean IC
    pub ic: Option<f64>,
    /// Standard deviation, ddof 1
    pub ic_std: Option<f64>,
    /// Mean over standard deviation
    pub ir: Option<f64>,
    /// Population skewness
    pub ic_skew: Option<f64>,
    /// Population excess kurtosis
    pub ic_kurt: Option<f64>,
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

impl IcStats {
    /// Computes the moments over the non-null, finite values.
    pub fn from_values(values: impl IntoIterator<Item = Option<f64>>) -> Self {
        let arr: Array1<f64> = values.into_iter().flatten().filter(|v| v.is_finite()).collect();
        let Some(mean) = arr.mean() else {
            return Self::default();
        };
        let n = arr.len();
        let ic_std = if n > 1 { finite(arr.std(1.0)) } else { None };
        let centered = arr.mapv(|v| v - mean);
        let m2 = centered.mapv(|v| v.powi(2)).mean().unwrap_or(f64::NAN);
        let m3 = centered.mapv(|v| v.powi(3)).mean().unwrap_or(f64::NAN);
        let m4 = centered.mapv(|v| v.powi(4)).mean().unwrap_or(f64::NAN);
        Self {
            ic: Some(mean),
            ic_std,
            ir: ic_std.and_then(|s| finite(mean / s)),
            ic_skew: finite(m3 / m2.powf(1.5)),
            ic_kurt: finite(m4 / m2.powi(2) - 3.0),
        }
    }

    /// Value of one moment. `None` for [`Metric::IcOverall`], which is not a moment.
    pub const fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Ic => self.ic,
            Metric::IcStd => self.ic_std,
            Metric::Ir => self.ir,
            Metric::IcSkew => self.ic_skew,
            Metric::IcKurt => self.ic_kurt,
            Metric::IcOverall => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case("ic", Some(Metric::Ic))]
    #[case("ic_std", Some(Metric::IcStd))]
    #[case("ir", Some(Metric::Ir))]
    #[case("ic_skew", Some(Metric::IcSkew))]
    #[case("ic_kurt", Some(Metric::IcKurt))]
    #[case("ic_overall", Some(Metric::IcOverall))]
    #[case("ic_mean", None)]
    #[case("", None)]
    fn test_parse(#[case] name: &str, #[case] expected: Option<Metric>) {
        assert_eq!(Metric::parse(name), expected);
    }

    #[test]
    fn test_stats_known_values() {
        let stats = IcStats::from_values([Some(1.0), Some(2.0), Some(3.0), Some(10.0), None]);
        assert_relative_eq!(stats.ic.unwrap(), 4.0);
        // sample variance: (9 + 4 + 1 + 36) / 3
        assert_relative_eq!(stats.ic_std.unwrap(), (50.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(stats.ir.unwrap(), 4.0 / (50.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        // m2 = 12.5, m3 = (-27 - 8 - 1 + 216) / 4 = 45
        assert_relative_eq!(stats.ic_skew.unwrap(), 45.0 / 12.5f64.powf(1.5), epsilon = 1e-12);
        // m4 = (81 + 16 + 1 + 1296) / 4 = 348.5
        assert_relative_eq!(stats.ic_kurt.unwrap(), 348.5 / 156.25 - 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stats_degenerate() {
        let stats = IcStats::from_values([Some(0.1)]);
        assert_eq!(stats.ic, Some(0.1));
        assert_eq!(stats.ic_std, None);
        assert_eq!(stats.ir, None);
        assert_eq!(stats.ic_skew, None);

        assert_eq!(IcStats::from_values([None, Some(f64::NAN)]), IcStats::default());
    }
}
