//! Column expressions shared by the analyses.

use polars::prelude::*;

use crate::CorrMethod;

/// Margin added around the factor range before bucketing.
pub const BUCKET_EPS: f64 = 1e-10;

/// Name of the forward-return label over `n` periods.
pub fn label_name(n: usize) -> String {
    format!("label_{n}")
}

/// Compounded forward return over `[t, t + n)` of the per-period return column `base`.
///
/// `label_1` is `base` itself. For longer horizons the log returns are summed over a window of
/// `n` rows (at least half of them valid) and the window is moved back so it starts at `t`. Rows
/// whose window runs past the end of the series are 0.
pub fn label_expr(base: &str, n: usize) -> Expr {
    if n <= 1 {
        return col(base).alias(label_name(1));
    }
    let options = RollingOptionsFixedWindow {
        window_size: n,
        min_periods: n.div_ceil(2),
        ..Default::default()
    };
    let shift = -i64::try_from(n - 1).unwrap_or(i64::MAX);
    ((lit(1.0) + col(base)).log(std::f64::consts::E).rolling_sum(options).exp() - lit(1.0))
        .shift(lit(shift))
        .fill_null(lit(0.0))
        .alias(label_name(n))
}

/// Clips `fac` to its `[q, 1 - q]` nearest-rank quantile band. NaN is treated as null.
pub fn winsorize(fac: &str, q: f64) -> Expr {
    let x = col(fac).cast(DataType::Float64).fill_nan(lit(NULL));
    let lower = x.clone().quantile(lit(q), QuantileMethod::Nearest);
    let upper = x.clone().quantile(lit(1.0 - q), QuantileMethod::Nearest);
    when(x.clone().lt(lower.clone()))
        .then(lower)
        .when(x.clone().gt(upper.clone()))
        .then(upper)
        .otherwise(x)
        .alias(fac)
}

fn pearson(a: Expr, b: Expr) -> Expr {
    let da = a.clone() - a.clone().mean();
    let db = b.clone() - b.clone().mean();
    (da * db).mean() / (a.std(0) * b.std(0))
}

/// Correlation of `a` and `b` over rows where both are present, clipped to `[-bound, bound]`.
///
/// Undefined correlations (constant input, fewer than two pairs) are null.
pub fn stable_corr(a: Expr, b: Expr, method: CorrMethod, bound: f64) -> Expr {
    let a = a.cast(DataType::Float64).fill_nan(lit(NULL));
    let b = b.cast(DataType::Float64).fill_nan(lit(NULL));
    let valid = a.clone().is_not_null().and(b.clone().is_not_null());
    let a = a.filter(valid.clone());
    let b = b.filter(valid);
    let corr = match method {
        CorrMethod::Pearson => pearson(a, b),
        CorrMethod::Spearman => {
            let rank = |e: Expr| {
                e.rank(RankOptions { method: RankMethod::Average, descending: false }, None)
                    .cast(DataType::Float64)
            };
            pearson(rank(a), rank(b))
        }
    }
    .fill_nan(lit(NULL));
    when(corr.clone().lt(lit(-bound)))
        .then(lit(-bound))
        .when(corr.clone().gt(lit(bound)))
        .then(lit(bound))
        .otherwise(corr)
}

/// Representative value of each bucket, lowest bucket first.
///
/// Ten and twenty buckets use fixed sets that skip zero, any other count is spaced evenly over
/// `[-1, 1]`.
pub fn group_labels(group: usize) -> Vec<f64> {
    match group {
        10 => vec![-1.0, -0.8, -0.6, -0.4, -0.2, 0.2, 0.4, 0.6, 0.8, 1.0],
        20 => (1..=10).rev().map(|i| -f64::from(i) / 10.0).chain((1..=10).map(|i| f64::from(i) / 10.0)).collect(),
        1 => vec![-1.0],
        n => (0..n).map(|i| -1.0 + 2.0 * i as f64 / (n - 1) as f64).collect(),
    }
}

/// Bucket value of every row of `fac`.
///
/// The range `[min - eps, max + eps]` is split into `group` equal-width right-closed bins. Null
/// and NaN rows stay null.
pub fn bucket(fac: &str, group: usize) -> Expr {
    let labels = group_labels(group.max(1));
    let x = col(fac).cast(DataType::Float64).fill_nan(lit(NULL));
    let lo = x.clone().min() - lit(BUCKET_EPS);
    let hi = x.clone().max() + lit(BUCKET_EPS);
    let width = (hi - lo.clone()) / lit(labels.len() as f64);
    let last = labels.len() - 1;
    let mut expr = when(x.clone().is_not_null()).then(lit(labels[last])).otherwise(lit(NULL));
    for k in (0..last).rev() {
        let edge = lo.clone() + width.clone() * lit((k + 1) as f64);
        expr = when(x.clone().lt_eq(edge)).then(lit(labels[k])).otherwise(expr);
    }
    expr.cast(DataType::Float64).alias("group")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn eval(df: &DataFrame, expr: Expr) -> Vec<Option<f64>> {
        let out = df.clone().lazy().select([expr.alias("out")]).collect().unwrap();
        out.column("out").unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn test_label_compounds_forward() {
        let ret: Vec<f64> = (0..8).map(|i| 0.01 * f64::from(i)).collect();
        let df = df!("ret" => &ret).unwrap();
        let label = eval(&df, label_expr("ret", 3));
        for i in 0..6 {
            let expected = (1.0 + ret[i]) * (1.0 + ret[i + 1]) * (1.0 + ret[i + 2]) - 1.0;
            assert_relative_eq!(label[i].unwrap(), expected, epsilon = 1e-12);
        }
        assert_eq!(label[6], Some(0.0));
        assert_eq!(label[7], Some(0.0));
    }

    #[test]
    fn test_label_one_is_identity() {
        let df = df!("ret" => [Some(0.1), None, Some(-0.2)]).unwrap();
        assert_eq!(eval(&df, label_expr("ret", 1)), vec![Some(0.1), None, Some(-0.2)]);
    }

    #[test]
    fn test_winsorize_clips_and_is_idempotent() {
        let mut values: Vec<f64> = (0..100).map(f64::from).collect();
        values[0] = -1e6;
        values[99] = 1e6;
        values[50] = f64::NAN;
        let df = df!("fac" => &values).unwrap();
        let once = eval(&df, winsorize("fac", 0.025));
        assert_eq!(once[50], None);
        let valid: Vec<f64> = once.iter().flatten().copied().collect();
        let lo = valid.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(lo > -1e6 && hi < 1e6);

        let df2 = df!("fac" => &once).unwrap();
        assert_eq!(eval(&df2, winsorize("fac", 0.025)), once);
    }

    #[rstest]
    #[case(CorrMethod::Pearson)]
    #[case(CorrMethod::Spearman)]
    fn test_corr_is_clipped(#[case] method: CorrMethod) {
        let df = df!("a" => [1.0, 2.0, 3.0, 4.0, 5.0], "b" => [2.0, 4.0, 6.0, 8.0, 100.0]).unwrap();
        let out = eval(&df, stable_corr(col("a"), col("b"), method, 0.2));
        assert_eq!(out, vec![Some(0.2)]);
        let out = eval(&df, stable_corr(col("a"), -col("b"), method, 0.2));
        assert_eq!(out, vec![Some(-0.2)]);
    }

    #[test]
    fn test_corr_inside_bound_matches_pearson() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [0.3, -0.1, 0.2, 0.1, -0.3, 0.4];
        let df = df!("a" => a, "b" => b).unwrap();
        let out = eval(&df, stable_corr(col("a"), col("b"), CorrMethod::Pearson, 1.0))[0].unwrap();
        let ma = a.iter().sum::<f64>() / 6.0;
        let mb = b.iter().sum::<f64>() / 6.0;
        let cov: f64 = a.iter().zip(&b).map(|(x, y)| (x - ma) * (y - mb)).sum();
        let va: f64 = a.iter().map(|x| (x - ma).powi(2)).sum();
        let vb: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
        assert_relative_eq!(out, cov / (va * vb).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_corr_skips_missing_pairs_and_nulls_degenerate() {
        let df = df!(
            "a" => [Some(1.0), Some(2.0), None, Some(4.0)],
            "b" => [Some(5.0), Some(5.0), Some(1.0), Some(5.0)],
        )
        .unwrap();
        assert_eq!(eval(&df, stable_corr(col("a"), col("b"), CorrMethod::Pearson, 0.2)), vec![None]);
    }

    #[rstest]
    #[case(10)]
    #[case(20)]
    #[case(5)]
    fn test_group_labels(#[case] group: usize) {
        let labels = group_labels(group);
        assert_eq!(labels.len(), group);
        assert_relative_eq!(labels[0], -1.0);
        assert_relative_eq!(labels[group - 1], 1.0);
        assert!(labels.windows(2).all(|w| w[0] < w[1]));
        if group != 5 {
            assert!(labels.iter().all(|v| v.abs() > 1e-12));
        }
    }

    #[test]
    fn test_bucket_assigns_every_row() {
        let values: Vec<Option<f64>> = (0..50).map(|i| Some(f64::from(i) * 1.5)).chain([None]).collect();
        let df = df!("fac" => &values).unwrap();
        let groups = eval(&df, bucket("fac", 10));
        assert_eq!(groups[50], None);
        let assigned: Vec<f64> = groups[..50].iter().map(|g| g.unwrap()).collect();
        assert_relative_eq!(assigned[0], -1.0);
        assert_relative_eq!(assigned[49], 1.0);
        let mut distinct = assigned.clone();
        distinct.dedup();
        assert_eq!(distinct, group_labels(10));
    }
}
