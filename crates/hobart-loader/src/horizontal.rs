//! Cross-symbol aggregation of aligned frames.

use derive_more::Display;
use polars::prelude::*;

use crate::{DataLoader, LoaderError, Result};

/// How one column is combined across symbols, row by row.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum HorizontalAgg {
    /// First non-null value in symbol order
    #[display("first")]
    First,
    /// Mean of the non-null values
    #[display("mean")]
    Mean,
    /// `Σ v·w / Σ w` over symbols where value and weight are both non-null
    #[display("weight_mean({_0})")]
    WeightMean(String),
    /// Sum of the non-null values
    #[display("sum")]
    Sum,
}

fn part(name: &str, i: usize) -> Expr {
    col(format!("{name}:{i}"))
}

fn sum_all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    exprs.into_iter().reduce(|acc, e| acc + e).unwrap_or_else(|| lit(0.0))
}

impl HorizontalAgg {
    fn expr(&self, name: &str, n: usize) -> Expr {
        let value = |i: usize| part(name, i).cast(DataType::Float64);
        let out = match self {
            Self::First => {
                let mut e = part(name, n - 1);
                for i in (0..n - 1).rev() {
                    e = when(part(name, i).is_not_null()).then(part(name, i)).otherwise(e);
                }
                e
            }
            Self::Mean | Self::Sum => {
                let total = sum_all((0..n).map(|i| value(i).fill_null(lit(0.0))));
                let count = sum_all((0..n).map(|i| value(i).is_not_null().cast(DataType::Float64)));
                let combined = if *self == Self::Mean { total / count.clone() } else { total };
                when(count.gt(lit(0.0))).then(combined).otherwise(lit(NULL))
            }
            Self::WeightMean(weight) => {
                let weighted = |i: usize, e: Expr| {
                    let valid = value(i).is_not_null().and(part(weight, i).is_not_null());
                    when(valid).then(e).otherwise(lit(0.0))
                };
                let weight_at = |i: usize| part(weight, i).cast(DataType::Float64);
                let num = sum_all((0..n).map(|i| weighted(i, value(i) * weight_at(i))));
                let den = sum_all((0..n).map(|i| weighted(i, weight_at(i))));
                when(den.clone().neq(lit(0.0))).then(num / den).otherwise(lit(NULL))
            }
        };
        out.alias(name)
    }
}

/// Combines equally tall, row-aligned frames into one.
///
/// Every column of the first frame is aggregated with its entry in `overrides`, or `default`.
/// When `default` is a weighted mean its weight column is summed unless overridden.
pub fn horizontal_agg(
    frames: &[DataFrame],
    overrides: &[(&str, HorizontalAgg)],
    default: &HorizontalAgg,
) -> Result<DataFrame> {
    let Some(first) = frames.first() else {
        return Ok(DataFrame::empty());
    };
    let height = first.height();
    let names: Vec<String> = first.get_column_names().into_iter().map(|s| s.to_string()).collect();
    let mut columns = Vec::with_capacity(names.len() * frames.len());
    for (i, df) in frames.iter().enumerate() {
        if df.height() != height {
            return Err(LoaderError::Alignment {
                frame: i,
                reason: format!("height {} differs from {height}", df.height()),
            });
        }
        for name in &names {
            let column = df.column(name).map_err(|_| LoaderError::Alignment {
                frame: i,
                reason: format!("missing column {name}"),
            })?;
            let mut series = column.as_materialized_series().clone();
            series.rename(format!("{name}:{i}").into());
            columns.push(Column::from(series));
        }
    }
    let exprs: Vec<Expr> = names
        .iter()
        .map(|name| {
            let method = overrides
                .iter()
                .find(|(c, _)| *c == name.as_str())
                .map(|(_, m)| m.clone())
                .unwrap_or_else(|| match default {
                    HorizontalAgg::WeightMean(w) if w == name => HorizontalAgg::Sum,
                    other => other.clone(),
                });
            method.expr(name, frames.len())
        })
        .collect();
    Ok(DataFrame::new(columns)?.lazy().select(exprs).collect()?)
}

impl DataLoader {
    /// Collects every frame and combines them with [`horizontal_agg`].
    pub fn horizontal_agg(
        &self,
        overrides: &[(&str, HorizontalAgg)],
        default: &HorizontalAgg,
    ) -> Result<DataFrame> {
        horizontal_agg(&self.eager_frames()?, overrides, default)
    }
}
