//! Per-factor result storage and derived IC statistics.

use std::fmt;

use derive_more::{Display, From};
use hobart_loader::DataLoader;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{IcRecord, IcStats, Metric, Result, SummaryError};

/// Name of the factor column in per-factor tables.
pub const FAC_COL: &str = "fac";

/// Every kind of stored result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// Per-symbol IC over the whole sample
    #[display("symbol_ic")]
    SymbolIc,
    /// Count-weighted cross-symbol IC
    #[display("ic_overall")]
    IcOverall,
    /// Cross-symbol IC per calendar bucket
    #[display("ts_ic")]
    TsIc,
    /// Per-symbol IC per calendar bucket
    #[display("symbol_ts_ic")]
    SymbolTsIc,
    /// Cross-symbol mean return per factor group
    #[display("group_rets")]
    GroupRets,
    /// Per-symbol mean return per factor group
    #[display("symbol_group_rets")]
    SymbolGroupRets,
    /// Cross-symbol daily return per factor group
    #[display("ts_group_rets")]
    TsGroupRets,
    /// Per-symbol daily return per factor group
    #[display("symbol_ts_group_rets")]
    SymbolTsGroupRets,
    /// Factor half-life
    #[display("half_life")]
    HalfLife,
}

/// Addresses one factor by position or by name.
#[derive(Debug, Clone, PartialEq, Eq, From)]
pub enum FactorKey {
    /// Position in the factor list
    Index(usize),
    /// Factor name
    Name(String),
}

impl From<&str> for FactorKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<&String> for FactorKey {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl fmt::Display for FactorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// A borrowed stored result.
#[derive(Debug, Clone, Copy)]
pub enum ResultRef<'a> {
    /// A single table
    Frame(&'a DataFrame),
    /// One table per symbol
    Loader(&'a DataLoader),
    /// A scalar
    Value(Option<f64>),
}

/// One slot per factor. `None` marks a factor the last run did not cover.
type Slots<T> = Option<Vec<Option<T>>>;

/// Results of a factor analysis run, one slot per factor.
///
/// Slot `i` of every stored list belongs to factor `i` of [`facs`](Self::facs). Derived IC
/// statistics are recomputed from the time-series IC on each read.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    facs: Vec<String>,
    labels: Vec<String>,
    symbol_ic: Slots<DataFrame>,
    ic_overall: Slots<DataFrame>,
    ts_ic: Slots<DataFrame>,
    symbol_ts_ic: Slots<DataLoader>,
    group_rets: Slots<DataFrame>,
    symbol_group_rets: Slots<DataLoader>,
    ts_group_rets: Slots<DataFrame>,
    symbol_ts_group_rets: Slots<DataLoader>,
    half_life: Option<DataFrame>,
}

fn slot<'a, T>(slots: &'a Slots<T>, i: usize, kind: ResultKind) -> Result<&'a T> {
    slots
        .as_ref()
        .and_then(|s| s.get(i))
        .and_then(Option::as_ref)
        .ok_or(SummaryError::NotComputed(kind))
}

/// Writes `updates` into their slots, leaving every other slot as it was.
fn merge<T>(slots: &mut Slots<T>, len: usize, updates: Vec<(usize, T)>) {
    let slots = slots.get_or_insert_with(|| (0..len).map(|_| None).collect());
    for (i, value) in updates {
        slots[i] = Some(value);
    }
}

impl Summary {
    /// Creates an empty store for `facs` evaluated against `labels`.
    pub fn new(facs: Vec<String>, labels: Vec<String>) -> Self {
        Self { facs, labels, ..Default::default() }
    }

    /// Factor names in slot order.
    pub fn facs(&self) -> &[String] {
        &self.facs
    }

    /// Label columns.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Position of the factor addressed by `key`.
    pub fn fac_index(&self, key: impl Into<FactorKey>) -> Result<usize> {
        match key.into() {
            FactorKey::Index(i) if i < self.facs.len() => Ok(i),
            FactorKey::Index(i) => Err(SummaryError::InvalidKey(format!(
                "index {i} out of range for {} factors",
                self.facs.len()
            ))),
            FactorKey::Name(name) => {
                self.facs.iter().position(|f| *f == name).ok_or(SummaryError::FactorNotFound(name))
            }
        }
    }

    /// View of one factor's results.
    pub fn fac(&self, key: impl Into<FactorKey>) -> Result<FacSummary<'_>> {
        let index = self.fac_index(key)?;
        Ok(FacSummary { summary: self, index })
    }

    /// Looks up one stored result of one factor.
    pub fn fac_attr(&self, key: impl Into<FactorKey>, kind: ResultKind) -> Result<ResultRef<'_>> {
        let i = self.fac_index(key)?;
        Ok(match kind {
            ResultKind::SymbolIc => ResultRef::Frame(slot(&self.symbol_ic, i, kind)?),
            ResultKind::IcOverall => ResultRef::Frame(slot(&self.ic_overall, i, kind)?),
            ResultKind::TsIc => ResultRef::Frame(slot(&self.ts_ic, i, kind)?),
            ResultKind::SymbolTsIc => ResultRef::Loader(slot(&self.symbol_ts_ic, i, kind)?),
            ResultKind::GroupRets => ResultRef::Frame(slot(&self.group_rets, i, kind)?),
            ResultKind::SymbolGroupRets => {
                ResultRef::Loader(slot(&self.symbol_group_rets, i, kind)?)
            }
            ResultKind::TsGroupRets => ResultRef::Frame(slot(&self.ts_group_rets, i, kind)?),
            ResultKind::SymbolTsGroupRets => {
                ResultRef::Loader(slot(&self.symbol_ts_group_rets, i, kind)?)
            }
            ResultKind::HalfLife => ResultRef::Value(self.half_life_of(i)?),
        })
    }

    fn check_len<T>(&self, values: &[T], kind: ResultKind) -> Result<()> {
        if values.len() == self.facs.len() {
            Ok(())
        } else {
            Err(SummaryError::InvalidKey(format!(
                "{kind} holds {} slots for {} factors",
                values.len(),
                self.facs.len()
            )))
        }
    }

    /// Stores the per-symbol and cross-symbol overall IC.
    pub fn set_ic_overall(
        &mut self,
        symbol_ic: Vec<Option<DataFrame>>,
        ic_overall: Vec<Option<DataFrame>>,
    ) -> Result<()> {
        self.check_len(&symbol_ic, ResultKind::SymbolIc)?;
        self.check_len(&ic_overall, ResultKind::IcOverall)?;
        self.symbol_ic = Some(symbol_ic);
        self.ic_overall = Some(ic_overall);
        Ok(())
    }

    /// Stores the time-series IC. `symbol_ts_ic` is `None` when per-symbol series are dropped.
    pub fn set_ts_ic(
        &mut self,
        ts_ic: Vec<Option<DataFrame>>,
        symbol_ts_ic: Option<Vec<Option<DataLoader>>>,
    ) -> Result<()> {
        self.check_len(&ts_ic, ResultKind::TsIc)?;
        if let Some(s) = &symbol_ts_ic {
            self.check_len(s, ResultKind::SymbolTsIc)?;
        }
        self.ts_ic = Some(ts_ic);
        self.symbol_ts_ic = symbol_ts_ic;
        Ok(())
    }

    /// Stores the daily grouped returns of some factors, keeping the others' results.
    pub fn update_ts_group_rets(&mut self, updates: Vec<(usize, DataFrame, DataLoader)>) -> Result<()> {
        for (i, ..) in &updates {
            self.fac_index(*i)?;
        }
        let (cross, per_symbol): (Vec<_>, Vec<_>) =
            updates.into_iter().map(|(i, c, p)| ((i, c), (i, p))).unzip();
        let len = self.facs.len();
        merge(&mut self.ts_group_rets, len, cross);
        merge(&mut self.symbol_ts_group_rets, len, per_symbol);
        Ok(())
    }

    /// Stores the grouped returns of some factors, keeping the others' results.
    pub fn update_group_rets(&mut self, updates: Vec<(usize, DataFrame, DataLoader)>) -> Result<()> {
        for (i, ..) in &updates {
            self.fac_index(*i)?;
        }
        let (cross, per_symbol): (Vec<_>, Vec<_>) =
            updates.into_iter().map(|(i, c, p)| ((i, c), (i, p))).unzip();
        let len = self.facs.len();
        merge(&mut self.group_rets, len, cross);
        merge(&mut self.symbol_group_rets, len, per_symbol);
        Ok(())
    }

    /// Stores the half-life table, one column per factor.
    pub fn set_half_life(&mut self, half_life: DataFrame) {
        self.half_life = Some(half_life);
    }

    /// Forgets the half-life so the next request recomputes it.
    pub fn invalidate_half_life(&mut self) {
        self.half_life = None;
    }

    /// Half-life table, one column per factor.
    pub const fn half_life(&self) -> Option<&DataFrame> {
        self.half_life.as_ref()
    }

    fn half_life_of(&self, i: usize) -> Result<Option<f64>> {
        let df = self.half_life.as_ref().ok_or(SummaryError::NotComputed(ResultKind::HalfLife))?;
        let column = df.column(&self.facs[i])?.cast(&DataType::Float64)?;
        Ok(column.f64()?.get(0))
    }

    /// Moments of every factor's time-series IC, per label.
    pub fn ic_stats(&self) -> Result<Vec<Vec<IcStats>>> {
        (0..self.facs.len())
            .map(|i| {
                let ts_ic = slot(&self.ts_ic, i, ResultKind::TsIc)?;
                self.labels
                    .iter()
                    .map(|label| {
                        let values = ts_ic.column(label)?.cast(&DataType::Float64)?;
                        Ok(IcStats::from_values(values.f64()?.into_iter()))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    /// Table with a `fac` column and one column per label.
    fn factor_table(&self, rows: Vec<Vec<Option<f64>>>) -> Result<DataFrame> {
        let mut columns = vec![Column::new(FAC_COL.into(), self.facs.clone())];
        for (j, label) in self.labels.iter().enumerate() {
            let values: Vec<Option<f64>> = rows.iter().map(|row| row.get(j).copied().flatten()).collect();
            columns.push(Column::new(label.as_str().into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }

    fn moment(&self, metric: Metric) -> Result<DataFrame> {
        let rows = self
            .ic_stats()?
            .into_iter()
            .map(|stats| stats.iter().map(|s| s.get(metric)).collect())
            .collect();
        self.factor_table(rows)
    }

    /// Mean time-series IC per factor and label.
    pub fn ic(&self) -> Result<DataFrame> {
        self.moment(Metric::Ic)
    }

    /// Standard deviation of the time-series IC.
    pub fn ic_std(&self) -> Result<DataFrame> {
        self.moment(Metric::IcStd)
    }

    /// `ic / ic_std`.
    pub fn ir(&self) -> Result<DataFrame> {
        self.moment(Metric::Ir)
    }

    /// Skewness of the time-series IC.
    pub fn ic_skew(&self) -> Result<DataFrame> {
        self.moment(Metric::IcSkew)
    }

    /// Excess kurtosis of the time-series IC.
    pub fn ic_kurt(&self) -> Result<DataFrame> {
        self.moment(Metric::IcKurt)
    }

    /// Cross-symbol overall IC of every factor, one row each.
    pub fn ic_overall(&self) -> Result<DataFrame> {
        let rows = (0..self.facs.len())
            .map(|i| {
                let df = slot(&self.ic_overall, i, ResultKind::IcOverall)?;
                self.labels
                    .iter()
                    .map(|label| {
                        let column = df.column(label)?.cast(&DataType::Float64)?;
                        Ok(column.f64()?.get(0))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        self.factor_table(rows)
    }

    /// Table for `metric`.
    pub fn metric(&self, metric: Metric) -> Result<DataFrame> {
        match metric {
            Metric::IcOverall => self.ic_overall(),
            other => self.moment(other),
        }
    }

    /// Table for the metric called `name`, or `None` when no metric has that name.
    pub fn metric_by_name(&self, name: &str) -> Result<Option<DataFrame>> {
        match Metric::parse(name) {
            Some(metric) => self.metric(metric).map(Some),
            None => {
                debug!(name, "unknown metric name");
                Ok(None)
            }
        }
    }

    /// One record per factor and label with the IC moments.
    pub fn ic_records(&self) -> Result<Vec<IcRecord>> {
        let stats = self.ic_stats()?;
        Ok(self
            .facs
            .iter()
            .zip(stats)
            .flat_map(|(fac, per_label)| {
                self.labels.iter().zip(per_label).map(move |(label, s)| IcRecord {
                    fac: fac.clone(),
                    label: label.clone(),
                    ic: s.ic,
                    ic_std: s.ic_std,
                    ir: s.ir,
                    ic_skew: s.ic_skew,
                    ic_kurt: s.ic_kurt,
                })
            })
            .collect())
    }
}

/// A view of one factor's results.
#[derive(Debug, Clone, Copy)]
pub struct FacSummary<'a> {
    summary: &'a Summary,
    index: usize,
}

impl<'a> FacSummary<'a> {
    /// Factor name.
    pub fn name(&self) -> &'a str {
        &self.summary.facs[self.index]
    }

    /// Position in the factor list.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Per-symbol overall IC: a `symbol` column, one column per label and `count`.
    pub fn symbol_ic(&self) -> Result<&'a DataFrame> {
        slot(&self.summary.symbol_ic, self.index, ResultKind::SymbolIc)
    }

    /// Count-weighted overall IC, one row.
    pub fn ic_overall(&self) -> Result<&'a DataFrame> {
        slot(&self.summary.ic_overall, self.index, ResultKind::IcOverall)
    }

    /// Cross-symbol time-series IC.
    pub fn ts_ic(&self) -> Result<&'a DataFrame> {
        slot(&self.summary.ts_ic, self.index, ResultKind::TsIc)
    }

    /// Per-symbol time-series IC on a shared time index.
    pub fn symbol_ts_ic(&self) -> Result<&'a DataLoader> {
        slot(&self.summary.symbol_ts_ic, self.index, ResultKind::SymbolTsIc)
    }

    /// Cross-symbol grouped returns, sorted by group.
    pub fn group_rets(&self) -> Result<&'a DataFrame> {
        slot(&self.summary.group_rets, self.index, ResultKind::GroupRets)
    }

    /// Per-symbol grouped returns.
    pub fn symbol_group_rets(&self) -> Result<&'a DataLoader> {
        slot(&self.summary.symbol_group_rets, self.index, ResultKind::SymbolGroupRets)
    }

    /// Cross-symbol daily grouped returns.
    pub fn ts_group_rets(&self) -> Result<&'a DataFrame> {
        slot(&self.summary.ts_group_rets, self.index, ResultKind::TsGroupRets)
    }

    /// Per-symbol daily grouped returns.
    pub fn symbol_ts_group_rets(&self) -> Result<&'a DataLoader> {
        slot(&self.summary.symbol_ts_group_rets, self.index, ResultKind::SymbolTsGroupRets)
    }

    /// Half-life in periods.
    pub fn half_life(&self) -> Result<Option<f64>> {
        self.summary.half_life_of(self.index)
    }

    /// IC moments per label.
    pub fn ic_stats(&self) -> Result<Vec<IcStats>> {
        let ts_ic = self.ts_ic()?;
        self.summary
            .labels
            .iter()
            .map(|label| {
                let values = ts_ic.column(label)?.cast(&DataType::Float64)?;
                Ok(IcStats::from_values(values.f64()?.into_iter()))
            })
            .collect()
    }

    /// `metric` per label, `None` where undefined.
    pub fn metric(&self, metric: Metric) -> Result<Vec<Option<f64>>> {
        match metric {
            Metric::IcOverall => {
                let df = self.ic_overall()?;
                self.summary
                    .labels
                    .iter()
                    .map(|label| Ok(df.column(label)?.cast(&DataType::Float64)?.f64()?.get(0)))
                    .collect()
            }
            other => Ok(self.ic_stats()?.iter().map(|s| s.get(other)).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn summary() -> Summary {
        let mut s = Summary::new(
            vec!["mom".into(), "rev".into()],
            vec!["label_1".into(), "label_5".into()],
        );
        let ts = |a: [f64; 3], b: [f64; 3]| {
            df!("time" => [1i64, 2, 3], "label_1" => a, "label_5" => b).unwrap()
        };
        s.set_ts_ic(
            vec![
                Some(ts([0.1, 0.2, 0.3], [0.05, 0.05, 0.05])),
                Some(ts([-0.1, 0.0, 0.1], [0.2, -0.2, 0.0])),
            ],
            None,
        )
        .unwrap();
        s
    }

    #[test]
    fn test_update_group_rets_keeps_other_factors() {
        let mut s = summary();
        let rets = |v: f64| df!("group" => [-1.0, 1.0], "label_1" => [-v, v]).unwrap();
        let per_symbol = || DataLoader::from_frames([rets(0.0)]);
        s.update_group_rets(vec![(0, rets(0.1), per_symbol()), (1, rets(0.2), per_symbol())]).unwrap();
        s.update_group_rets(vec![(1, rets(0.3), per_symbol())]).unwrap();

        let label_1 = |fac: &str| {
            let df = s.fac(fac).unwrap().group_rets().unwrap();
            df.column("label_1").unwrap().f64().unwrap().get(1)
        };
        assert_eq!(label_1("mom"), Some(0.1));
        assert_eq!(label_1("rev"), Some(0.3));
        assert!(matches!(
            s.fac("mom").unwrap().ts_group_rets(),
            Err(SummaryError::NotComputed(ResultKind::TsGroupRets))
        ));

        s.update_ts_group_rets(vec![(1, rets(0.4), per_symbol())]).unwrap();
        assert!(s.fac("rev").unwrap().symbol_ts_group_rets().is_ok());
        assert!(s.fac("mom").unwrap().ts_group_rets().is_err());
        assert!(matches!(
            s.update_group_rets(vec![(2, rets(0.5), per_symbol())]),
            Err(SummaryError::InvalidKey(_))
        ));
    }

    #[rstest]
    #[case(FactorKey::from("rev"), 1)]
    #[case(FactorKey::from(0usize), 0)]
    fn test_fac_index(#[case] key: FactorKey, #[case] expected: usize) {
        assert_eq!(summary().fac_index(key).unwrap(), expected);
    }

    #[test]
    fn test_lookup_errors() {
        let s = summary();
        assert!(matches!(s.fac_index("value"), Err(SummaryError::FactorNotFound(_))));
        assert!(matches!(s.fac_index(7usize), Err(SummaryError::InvalidKey(_))));
        assert!(matches!(
            s.fac("mom").unwrap().group_rets(),
            Err(SummaryError::NotComputed(ResultKind::GroupRets))
        ));
        assert!(matches!(
            s.fac_attr(0usize, ResultKind::HalfLife),
            Err(SummaryError::NotComputed(ResultKind::HalfLife))
        ));
    }

    #[test]
    fn test_ic_table() {
        let ic = summary().ic().unwrap();
        assert_eq!(ic.height(), 2);
        let label_1 = ic.column("label_1").unwrap().f64().unwrap();
        assert!((label_1.get(0).unwrap() - 0.2).abs() < 1e-12);
        assert!(label_1.get(1).unwrap().abs() < 1e-12);
        // constant series has zero deviation so the ratio is undefined
        let ir = summary().ir().unwrap();
        assert_eq!(ir.column("label_5").unwrap().f64().unwrap().get(0), None);
    }

    #[test]
    fn test_metric_by_name_is_permissive() {
        let s = summary();
        assert!(s.metric_by_name("ic_skew").unwrap().is_some());
        assert!(s.metric_by_name("sharpe").unwrap().is_none());
        assert!(matches!(
            s.metric_by_name("ic_overall"),
            Err(SummaryError::NotComputed(ResultKind::IcOverall))
        ));
    }

    #[test]
    fn test_slot_count_must_match_factors() {
        let mut s = summary();
        let err = s.set_ts_ic(vec![None], None).unwrap_err();
        assert!(matches!(err, SummaryError::InvalidKey(_)));
    }

    #[test]
    fn test_fac_summary_metric() {
        let s = summary();
        let rev = s.fac("rev").unwrap();
        assert_eq!(rev.name(), "rev");
        let std = rev.metric(Metric::IcStd).unwrap();
        assert!((std[0].unwrap() - 0.1).abs() < 1e-12);
    }
}
