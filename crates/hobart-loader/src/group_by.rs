//! Grouped views over a [`DataLoader`].

use polars::prelude::*;
use tracing::debug;

use crate::{DataLoader, Frame, GroupByTimeOpt, LoaderError, Result};

/// A pending grouping of every frame of a loader.
///
/// The only operation is [`agg`](Self::agg), which yields a new loader with one row per group
/// and symbol.
#[must_use = "a grouped view does nothing until aggregated"]
pub struct DataLoaderGroupBy {
    dl: DataLoader,
    lgbs: Vec<LazyGroupBy>,
    last_time: Option<String>,
    time: Option<String>,
}

impl std::fmt::Debug for DataLoaderGroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoaderGroupBy")
            .field("symbols", &self.dl.symbols())
            .field("groups", &self.lgbs.len())
            .field("last_time", &self.last_time)
            .field("time", &self.time)
            .finish()
    }
}

impl DataLoaderGroupBy {
    /// Aggregates every group of every frame.
    ///
    /// When a `last_time` column was requested its last value is appended per group. If it is the
    /// time column itself, the bucket label is replaced by the last observed timestamp.
    pub fn agg<E: AsRef<[Expr]>>(self, aggs: E) -> Result<DataLoader> {
        let Self { dl, lgbs, last_time, time } = self;
        let mut aggs = aggs.as_ref().to_vec();
        let replace_time = match (&last_time, &time) {
            (Some(last), Some(time)) if last == time => {
                let tmp = format!("{time}__last");
                aggs.push(col(time.as_str()).last().alias(tmp.as_str()));
                Some((time.clone(), tmp))
            }
            (Some(last), _) => {
                aggs.push(col(last.as_str()).last());
                None
            }
            _ => None,
        };
        let eager = dl.is_eager();
        let mut dfs = Vec::with_capacity(lgbs.len());
        for (i, lgb) in lgbs.into_iter().enumerate() {
            let mut lf = lgb.agg(&aggs);
            if let Some((time, tmp)) = &replace_time {
                lf = lf.with_column(col(tmp.as_str()).alias(time.as_str())).drop([tmp.as_str()]);
            }
            let frame = if eager {
                Frame::Eager(lf.collect().map_err(|e| LoaderError::for_symbol(dl.label_at(i), e))?)
            } else {
                Frame::Lazy(lf)
            };
            dfs.push(frame);
        }
        Ok(dl.copy_with_dfs(dfs))
    }
}

impl DataLoader {
    fn grouped<F>(self, f: F) -> DataLoaderGroupBy
    where
        F: Fn(LazyFrame) -> LazyGroupBy,
    {
        let lgbs = self.dfs.iter().map(|frame| f(frame.clone().lazy())).collect();
        DataLoaderGroupBy { dl: self, lgbs, last_time: None, time: None }
    }

    /// Groups every frame by `by`. Group order follows first appearance when `maintain_order`.
    pub fn group_by<E: AsRef<[Expr]>>(self, by: E, maintain_order: bool) -> DataLoaderGroupBy {
        let by = by.as_ref().to_vec();
        if maintain_order {
            self.grouped(|lf| lf.group_by_stable(&by))
        } else {
            self.grouped(|lf| lf.group_by(&by))
        }
    }

    /// Groups every frame into dynamic windows over `index_column`.
    pub fn group_by_dynamic<E: AsRef<[Expr]>>(
        self,
        index_column: Expr,
        group_by: E,
        options: DynamicGroupOptions,
    ) -> DataLoaderGroupBy {
        let group_by = group_by.as_ref().to_vec();
        self.grouped(|lf| lf.group_by_dynamic(index_column.clone(), &group_by, options.clone()))
    }

    /// Groups every frame by a calendar rule.
    ///
    /// `"daily"` groups on `opt.daily_col` (plus any extra keys) instead of resampling. Any other
    /// rule is a polars duration string such as `"1mo"`; windows are closed on the right for
    /// `rq` sourced data and on the left otherwise.
    pub fn group_by_time(self, rule: &str, opt: GroupByTimeOpt<'_>) -> Result<DataLoaderGroupBy> {
        debug!(rule, time = opt.time, typ = self.typ(), "group_by_time");
        let extra = opt.group_by.unwrap_or_default();
        let mut out = if rule == "daily" {
            let mut by = vec![col(opt.daily_col)];
            by.extend_from_slice(extra);
            let gb = self.group_by(by, opt.maintain_order);
            DataLoaderGroupBy { time: Some(opt.daily_col.to_string()), ..gb }
        } else {
            if rule.trim().is_empty() {
                return Err(LoaderError::Unsupported("empty group_by_time rule".into()));
            }
            let closed_window = match self.typ() {
                Some("rq") => ClosedWindow::Right,
                _ => ClosedWindow::Left,
            };
            let every = Duration::try_parse(rule)?;
            let options = DynamicGroupOptions {
                every,
                period: every,
                offset: Duration::parse("0ns"),
                label: opt.label,
                closed_window,
                ..Default::default()
            };
            let gb = self.group_by_dynamic(col(opt.time), extra, options);
            DataLoaderGroupBy { time: Some(opt.time.to_string()), ..gb }
        };
        out.last_time = opt.last_time.map(str::to_string);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn daily_frame() -> DataFrame {
        let dates: Vec<NaiveDate> = (1..=6)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .chain((1..=4).map(|d| NaiveDate::from_ymd_opt(2024, 2, d).unwrap()))
            .collect();
        let n = dates.len();
        df!(
            "time" => dates,
            "value" => (0..n).map(|i| i as f64).collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn test_group_by_time_monthly() {
        let dl = DataLoader::new(Some(vec!["A".into()]), vec![daily_frame().into()]).unwrap();
        let out = dl
            .group_by_time("1mo", GroupByTimeOpt::default())
            .unwrap()
            .agg([col("value").sum()])
            .unwrap();
        let df = out[0].as_eager().unwrap();
        assert_eq!(df.height(), 2);
        let sums: Vec<Option<f64>> = df.column("value").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(sums, vec![Some(15.0), Some(30.0)]);
    }

    #[test]
    fn test_group_by_time_daily_with_extra_keys() {
        let df = df!(
            "trading_date" => [1i32, 1, 1, 2, 2],
            "group" => [0.2, 0.2, -0.2, 0.2, -0.2],
            "ret" => [1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();
        let keys = [col("group")];
        let out = DataLoader::from_frames([df])
            .group_by_time("daily", GroupByTimeOpt::default().group_by(&keys))
            .unwrap()
            .agg([col("ret").sum()])
            .unwrap();
        let df = out[0].as_eager().unwrap();
        assert_eq!(df.height(), 4);
        let rets: Vec<Option<f64>> = df.column("ret").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(rets, vec![Some(3.0), Some(3.0), Some(4.0), Some(5.0)]);
    }

    #[test]
    fn test_last_time_replaces_label() {
        let dl = DataLoader::from_frames([daily_frame()]);
        let out = dl
            .group_by_time("1mo", GroupByTimeOpt::default().last_time("time"))
            .unwrap()
            .agg([col("value").count().alias("n")])
            .unwrap();
        let df = out[0].as_eager().unwrap();
        let last = df.column("time").unwrap().as_materialized_series().date().unwrap().get(0);
        assert_eq!(last, Some(19728)); // 2024-01-06
        assert!(!out.columns().unwrap().iter().any(|c| c.ends_with("__last")));
    }

    #[test]
    fn test_lazy_group_by_stays_lazy() {
        let dl = DataLoader::from_frames([daily_frame().lazy()]);
        let out = dl.group_by([col("time")], true).agg([col("value").sum()]).unwrap();
        assert!(out.is_lazy());
    }
}
