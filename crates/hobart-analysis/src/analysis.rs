//! The factor analysis engine.

use hobart_loader::{DataLoader, GroupByTimeOpt, HorizontalAgg, LoaderSource, horizontal_agg};
use hobart_output::{FactorKey, Summary};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::exprs::{bucket, label_expr, label_name, stable_corr, winsorize};
use crate::{AnalysisConfig, CorrMethod, Result, half_life};

const GROUP_COL: &str = "group";
const COUNT_COL: &str = "count";

/// Evaluates factor columns against forward-return labels across symbols.
///
/// Construction winsorizes the factors, adds one `label_{n}` column per horizon and collects the
/// result once. Every analysis reads that snapshot and overwrites its previous result in
/// [`summary`](Self::summary).
#[derive(Debug, Clone)]
pub struct FactorAnalysis {
    dl: DataLoader,
    facs: Vec<String>,
    base_label: String,
    periods: Vec<usize>,
    labels: Vec<String>,
    config: AnalysisConfig,
    summary: Summary,
}

/// Builder for [`FactorAnalysis`].
#[derive(Debug)]
pub struct FactorAnalysisBuilder {
    source: LoaderSource,
    facs: Vec<String>,
    base_label: String,
    symbols: Option<Vec<String>>,
    typ: Option<String>,
    freq: Option<String>,
    config: AnalysisConfig,
}

impl FactorAnalysisBuilder {
    /// Symbols of the source frames, in order.
    pub fn symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = Some(symbols.into_iter().map(Into::into).collect());
        self
    }

    /// Horizons to evaluate in addition to `1`.
    pub fn label_periods(mut self, periods: Vec<usize>) -> Self {
        self.config.label_periods = periods;
        self
    }

    /// Source type tag.
    pub fn typ(mut self, typ: impl Into<String>) -> Self {
        self.typ = Some(typ.into());
        self
    }

    /// Sampling frequency tag; `"daily"` makes `time` the daily column.
    pub fn freq(mut self, freq: impl Into<String>) -> Self {
        self.freq = Some(freq.into());
        self
    }

    /// Whether factors are winsorized.
    pub const fn drop_peak(mut self, drop_peak: bool) -> Self {
        self.config.drop_peak = drop_peak;
        self
    }

    /// Replaces the whole config.
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the engine, computing labels.
    pub fn build(self) -> Result<FactorAnalysis> {
        let Self { source, facs, base_label, symbols, typ, freq, config } = self;
        let mut dl = DataLoader::from_source(source, symbols)?;
        if let Some(typ) = typ {
            dl = dl.with_type(typ);
        }
        if let Some(freq) = freq {
            dl = dl.with_freq(freq);
        }
        FactorAnalysis::init(dl, facs, base_label, config)
    }
}

impl FactorAnalysis {
    /// Starts a builder over `source`.
    pub fn builder<I, S>(source: LoaderSource, facs: I, base_label: impl Into<String>) -> FactorAnalysisBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FactorAnalysisBuilder {
            source,
            facs: facs.into_iter().map(Into::into).collect(),
            base_label: base_label.into(),
            symbols: None,
            typ: None,
            freq: None,
            config: AnalysisConfig::default(),
        }
    }

    /// Creates the engine from a config.
    pub fn from_config(
        source: LoaderSource,
        facs: Vec<String>,
        base_label: impl Into<String>,
        symbols: Option<Vec<String>>,
        config: AnalysisConfig,
    ) -> Result<Self> {
        let dl = DataLoader::from_source(source, symbols)?;
        Self::init(dl, facs, base_label.into(), config)
    }

    fn init(dl: DataLoader, facs: Vec<String>, base_label: String, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let periods = config.periods();
        let labels: Vec<String> = periods.iter().map(|&n| label_name(n)).collect();
        info!(facs = ?facs, periods = ?periods, symbols = dl.len(), "initializing factor analysis");

        let mut dl = dl;
        if config.drop_peak {
            let winsorized: Vec<Expr> =
                facs.iter().map(|f| winsorize(f, config.winsor_quantile)).collect();
            dl = dl.with_columns(winsorized)?;
        }
        let label_exprs: Vec<Expr> = periods.iter().map(|&n| label_expr(&base_label, n)).collect();
        let dl = dl.with_columns(label_exprs)?.collect(Some("Calculating labels"))?.lazy();

        let summary = Summary::new(facs.clone(), labels.clone());
        Ok(Self { dl, facs, base_label, periods, labels, config, summary })
    }

    /// Label-augmented snapshot every analysis reads.
    pub const fn dl(&self) -> &DataLoader {
        &self.dl
    }

    /// Factor names.
    pub fn facs(&self) -> &[String] {
        &self.facs
    }

    /// Base return column.
    pub fn base_label(&self) -> &str {
        &self.base_label
    }

    /// Horizons, `1` first.
    pub fn periods(&self) -> &[usize] {
        &self.periods
    }

    /// Label columns, parallel to [`periods`](Self::periods).
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Engine config.
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Stored results.
    pub const fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Shorthand for [`summary`](Self::summary).
    pub const fn s(&self) -> &Summary {
        &self.summary
    }

    /// Indices of `facs`, or of every factor.
    fn resolve(&self, facs: Option<&[&str]>) -> Result<Vec<usize>> {
        match facs {
            None => Ok((0..self.facs.len()).collect()),
            Some(facs) => facs.iter().map(|f| Ok(self.summary.fac_index(*f)?)).collect(),
        }
    }

    fn corr_exprs(&self, fac: &str, method: CorrMethod) -> Vec<Expr> {
        self.labels
            .iter()
            .map(|label| {
                stable_corr(col(fac), col(label.as_str()), method, self.config.ic_bound).alias(label.as_str())
            })
            .collect()
    }

    /// Correlation of each factor with each label over every symbol's full sample.
    ///
    /// Stores one row per symbol (labels plus the count of non-null factor values) and the
    /// count-weighted mean across symbols.
    pub fn ic_overall(&mut self, method: CorrMethod) -> Result<&mut Self> {
        info!(%method, "computing overall IC");
        let results = self
            .facs
            .par_iter()
            .map(|fac| {
                let mut exprs = self.corr_exprs(fac, method);
                exprs.push(col(fac.as_str()).count().alias(COUNT_COL));
                let per_symbol = self.dl.clone().select(exprs)?.collect(None)?;
                let symbol_ic = per_symbol.concat()?.collect()?;
                let overall = per_symbol
                    .horizontal_agg(&[], &HorizontalAgg::WeightMean(COUNT_COL.to_string()))?;
                debug!(fac = %fac, "overall IC done");
                Ok((Some(symbol_ic), Some(overall)))
            })
            .collect::<Result<Vec<_>>>()?;
        let (symbol_ic, overall): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        self.summary.set_ic_overall(symbol_ic, overall)?;
        Ok(self)
    }

    /// Correlation of each factor with each label per calendar bucket.
    ///
    /// `rule` is a polars duration such as `"1mo"`, or `"daily"`. Per-symbol series are aligned
    /// on the daily column and combined by taking the first non-null symbol. Per-symbol series
    /// are kept only with `keep_symbol_ic`.
    pub fn ts_ic(&mut self, rule: &str, method: CorrMethod, keep_symbol_ic: bool) -> Result<&mut Self> {
        let daily = self.dl.daily_col();
        info!(rule, %method, daily, "computing time-series IC");
        let results = self
            .facs
            .par_iter()
            .map(|fac| {
                let opt = GroupByTimeOpt::default().time(daily).daily_col(daily);
                let symbol_ts_ic = self
                    .dl
                    .clone()
                    .group_by_time(rule, opt)?
                    .agg(self.corr_exprs(fac, method))?
                    .collect(None)?
                    .align(&[daily], None)?;
                let ts_ic = symbol_ts_ic.horizontal_agg(&[], &HorizontalAgg::First)?;
                Ok((Some(ts_ic), Some(symbol_ts_ic)))
            })
            .collect::<Result<Vec<_>>>()?;
        let (ts_ic, symbol_ts_ic): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        self.summary.set_ts_ic(ts_ic, keep_symbol_ic.then_some(symbol_ts_ic))?;
        Ok(self)
    }

    /// Daily sum of `label_n / n` per factor bucket.
    ///
    /// Runs for `facs`, or every factor; other factors keep their stored results. `group`
    /// defaults to the configured bucket count.
    pub fn ts_group_ret(&mut self, facs: Option<&[&str]>, group: Option<usize>) -> Result<&mut Self> {
        let indices = self.resolve(facs)?;
        let group = group.unwrap_or(self.config.group);
        let daily = self.dl.daily_col();
        info!(group, daily, factors = indices.len(), "computing daily grouped returns");
        let results = indices
            .par_iter()
            .map(|&i| {
                let fac = self.facs[i].as_str();
                let sums: Vec<Expr> = self
                    .periods
                    .iter()
                    .zip(&self.labels)
                    .map(|(&n, label)| (col(label.as_str()) / lit(n as f64)).sum().alias(label.as_str()))
                    .collect();
                let per_symbol = self
                    .dl
                    .clone()
                    .with_column(bucket(fac, group))?
                    .filter(col(GROUP_COL).is_not_null())?
                    .group_by([col(daily), col(GROUP_COL)], false)
                    .agg(sums)?
                    .sort(&[GROUP_COL, daily])?
                    .collect(None)?
                    .align(&[GROUP_COL, daily], None)?;
                let cross = per_symbol.horizontal_agg(
                    &[(GROUP_COL, HorizontalAgg::First), (daily, HorizontalAgg::First)],
                    &HorizontalAgg::Mean,
                )?;
                Ok((i, cross, per_symbol))
            })
            .collect::<Result<Vec<_>>>()?;
        self.summary.update_ts_group_rets(results)?;
        Ok(self)
    }

    fn group_aggs(&self, fac: &str) -> Vec<Expr> {
        let mut aggs = vec![
            col(fac).min().alias("min"),
            col(fac).max().alias("max"),
            col(fac).count().alias(COUNT_COL),
        ];
        aggs.extend(self.labels.iter().map(|l| col(l.as_str()).mean()));
        aggs
    }

    /// Mean label per factor bucket, combined across symbols.
    ///
    /// Without `rule` each symbol is bucketed over its whole sample and symbols are combined by
    /// a count-weighted mean. With `rule` buckets are computed per calendar period, averaged over
    /// periods, then averaged across symbols.
    pub fn group_ret(
        &mut self,
        facs: Option<&[&str]>,
        rule: Option<&str>,
        group: Option<usize>,
    ) -> Result<&mut Self> {
        let indices = self.resolve(facs)?;
        let group = group.unwrap_or(self.config.group);
        let daily = self.dl.daily_col();
        info!(group, rule, factors = indices.len(), "computing grouped returns");
        let results = indices
            .par_iter()
            .map(|&i| {
                let fac = self.facs[i].as_str();
                let bucketed = self
                    .dl
                    .clone()
                    .with_column(bucket(fac, group))?
                    .filter(col(GROUP_COL).is_not_null())?;
                let (cross, per_symbol) = match rule {
                    None => {
                        let per_symbol = bucketed
                            .group_by([col(GROUP_COL)], false)
                            .agg(self.group_aggs(fac))?
                            .collect(None)?
                            .align(&[GROUP_COL], None)?;
                        let cross = per_symbol.horizontal_agg(
                            &[(GROUP_COL, HorizontalAgg::First)],
                            &HorizontalAgg::WeightMean(COUNT_COL.to_string()),
                        )?;
                        (cross, per_symbol)
                    }
                    Some(rule) => {
                        let keys = [col(GROUP_COL)];
                        let opt = GroupByTimeOpt::default().time(daily).daily_col(daily).group_by(&keys);
                        let per_symbol = bucketed
                            .sort(&[GROUP_COL, daily])?
                            .group_by_time(rule, opt)?
                            .agg(self.group_aggs(fac))?
                            .collect(None)?
                            .align(&[GROUP_COL, daily], None)?;
                        let mut value_cols = vec!["min", "max", COUNT_COL];
                        value_cols.extend(self.labels.iter().map(String::as_str));
                        let means: Vec<Expr> = value_cols.iter().map(|c| col(*c).mean()).collect();
                        let per_group = per_symbol
                            .clone()
                            .group_by([col(GROUP_COL)], true)
                            .agg(means)?
                            .sort(&[GROUP_COL])?;
                        let cross = per_group
                            .horizontal_agg(&[(GROUP_COL, HorizontalAgg::First)], &HorizontalAgg::Mean)?;
                        (cross, per_symbol)
                    }
                };
                Ok((i, cross, per_symbol))
            })
            .collect::<Result<Vec<_>>>()?;
        self.summary.update_group_rets(results)?;
        Ok(self)
    }

    /// Half-life of every factor, averaged across symbols. Computed once and cached.
    pub fn half_life(&mut self) -> Result<&mut Self> {
        if self.summary.half_life().is_some() {
            return Ok(self);
        }
        info!("computing factor half-life");
        let selected: Vec<Expr> = self.facs.iter().map(|f| col(f.as_str())).collect();
        let frames = self.dl.clone().select(selected)?.eager_frames()?;
        let rows = frames
            .par_iter()
            .map(|df| {
                let columns = self
                    .facs
                    .iter()
                    .map(|fac| {
                        let values = df.column(fac)?.cast(&DataType::Float64)?;
                        let values: Vec<Option<f64>> = values.f64()?.into_iter().collect();
                        Ok(Column::new(fac.as_str().into(), [half_life::half_life(&values)]))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(DataFrame::new(columns)?)
            })
            .collect::<Result<Vec<_>>>()?;
        let table = horizontal_agg(&rows, &[], &HorizontalAgg::Mean)?;
        self.summary.set_half_life(table);
        Ok(self)
    }

    /// Drops the cached half-life.
    pub fn invalidate_half_life(&mut self) -> &mut Self {
        self.summary.invalidate_half_life();
        self
    }

    /// Mutable access for callers that store results computed elsewhere.
    pub const fn summary_mut(&mut self) -> &mut Summary {
        &mut self.summary
    }

    /// Position of a factor.
    pub fn fac_index(&self, key: impl Into<FactorKey>) -> Result<usize> {
        Ok(self.summary.fac_index(key)?)
    }
}
