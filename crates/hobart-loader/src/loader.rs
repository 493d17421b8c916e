//! The per-symbol frame collection.

use std::collections::HashSet;
use std::ops::Index;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use derive_more::From;
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::debug;

use crate::{EngineConfig, Frame, LoaderError, Result};

/// Where a [`DataLoader`] takes its frames from.
#[derive(Debug, Clone, From)]
pub enum LoaderSource {
    /// A file or directory written by [`DataLoader::save`]
    Path(PathBuf),
    /// A single frame
    Frame(Frame),
    /// One frame per symbol
    Frames(Vec<Frame>),
    /// An existing loader
    Loader(DataLoader),
}

impl From<DataFrame> for LoaderSource {
    fn from(df: DataFrame) -> Self {
        Self::Frame(df.into())
    }
}

impl From<LazyFrame> for LoaderSource {
    fn from(lf: LazyFrame) -> Self {
        Self::Frame(lf.into())
    }
}

impl From<Vec<DataFrame>> for LoaderSource {
    fn from(dfs: Vec<DataFrame>) -> Self {
        Self::Frames(dfs.into_iter().map(Frame::from).collect())
    }
}

impl From<Vec<LazyFrame>> for LoaderSource {
    fn from(lfs: Vec<LazyFrame>) -> Self {
        Self::Frames(lfs.into_iter().map(Frame::from).collect())
    }
}

/// An ordered collection of per-symbol frames sharing collection-wide metadata.
///
/// Operations broadcast over every frame and return a new loader. Symbols, when present, are
/// unique and parallel to the frames.
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    pub(crate) symbols: Option<Vec<String>>,
    pub(crate) dfs: Vec<Frame>,
    pub(crate) typ: Option<String>,
    pub(crate) freq: Option<String>,
    pub(crate) start: Option<NaiveDateTime>,
    pub(crate) end: Option<NaiveDateTime>,
    pub(crate) config: EngineConfig,
}

impl DataLoader {
    /// Creates a loader, checking that symbols and frames line up.
    pub fn new(symbols: Option<Vec<String>>, dfs: Vec<Frame>) -> Result<Self> {
        Self::default().with_dfs(dfs).with_symbols(symbols)
    }

    /// Creates an unindexed loader.
    pub fn from_frames(dfs: impl IntoIterator<Item = impl Into<Frame>>) -> Self {
        Self::default().with_dfs(dfs.into_iter().map(Into::into).collect())
    }

    /// Resolves a [`LoaderSource`].
    ///
    /// Path sources are loaded lazily, restricted to `symbols` when given.
    pub fn from_source(source: LoaderSource, symbols: Option<Vec<String>>) -> Result<Self> {
        match source {
            LoaderSource::Path(path) => Self::load(path, symbols.as_deref(), true),
            LoaderSource::Frame(frame) => Self::new(symbols, vec![frame]),
            LoaderSource::Frames(frames) => Self::new(symbols, frames),
            LoaderSource::Loader(dl) => match symbols {
                Some(symbols) => dl.with_symbols(Some(symbols)),
                None => Ok(dl),
            },
        }
    }

    /// Replaces the symbol list. Symbols must be unique.
    pub fn with_symbols(mut self, symbols: Option<Vec<String>>) -> Result<Self> {
        if let Some(symbols) = &symbols {
            if symbols.len() != self.dfs.len() {
                return Err(LoaderError::SymbolMismatch {
                    symbols: symbols.len(),
                    frames: self.dfs.len(),
                });
            }
            let mut seen = HashSet::with_capacity(symbols.len());
            if let Some(dup) = symbols.iter().find(|s| !seen.insert(s.as_str())) {
                return Err(LoaderError::DuplicateSymbol(dup.clone()));
            }
        }
        self.symbols = symbols;
        Ok(self)
    }

    /// Replaces the frames, keeping metadata.
    pub fn with_dfs(mut self, dfs: Vec<Frame>) -> Self {
        self.dfs = dfs;
        self
    }

    /// Sets the source type tag.
    pub fn with_type(mut self, typ: impl Into<String>) -> Self {
        self.typ = Some(typ.into());
        self
    }

    /// Sets the sampling frequency tag.
    pub fn with_freq(mut self, freq: impl Into<String>) -> Self {
        self.freq = Some(freq.into());
        self
    }

    /// Sets the start timestamp.
    pub const fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = Some(start);
        self
    }

    /// Sets the end timestamp.
    pub const fn with_end(mut self, end: NaiveDateTime) -> Self {
        self.end = Some(end);
        self
    }

    /// Sets the expression parsing config.
    pub const fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Same metadata, no frames.
    pub fn empty_copy(&self) -> Self {
        Self {
            symbols: self.symbols.clone(),
            dfs: Vec::new(),
            typ: self.typ.clone(),
            freq: self.freq.clone(),
            start: self.start,
            end: self.end,
            config: self.config,
        }
    }

    /// Same metadata, new frames.
    pub fn copy_with_dfs(&self, dfs: Vec<Frame>) -> Self {
        self.empty_copy().with_dfs(dfs)
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.dfs.len()
    }

    /// True when there are no frames.
    pub fn is_empty(&self) -> bool {
        self.dfs.is_empty()
    }

    /// True when the first frame is materialized.
    pub fn is_eager(&self) -> bool {
        self.dfs.first().is_some_and(Frame::is_eager)
    }

    /// True when the first frame is a deferred plan.
    pub fn is_lazy(&self) -> bool {
        self.dfs.first().is_some_and(Frame::is_lazy)
    }

    /// Symbols, if the loader is indexed.
    pub fn symbols(&self) -> Option<&[String]> {
        self.symbols.as_deref()
    }

    /// Frames in symbol order.
    pub fn frames(&self) -> &[Frame] {
        &self.dfs
    }

    /// Consumes the loader into its frames.
    pub fn into_frames(self) -> Vec<Frame> {
        self.dfs
    }

    /// Source type tag.
    pub fn typ(&self) -> Option<&str> {
        self.typ.as_deref()
    }

    /// Sampling frequency tag.
    pub fn freq(&self) -> Option<&str> {
        self.freq.as_deref()
    }

    /// Start timestamp.
    pub const fn start(&self) -> Option<NaiveDateTime> {
        self.start
    }

    /// End timestamp.
    pub const fn end(&self) -> Option<NaiveDateTime> {
        self.end
    }

    /// Expression parsing config.
    pub const fn engine_config(&self) -> EngineConfig {
        self.config
    }

    /// Column holding the trading day: `time` for daily data, `trading_date` otherwise.
    pub fn daily_col(&self) -> &'static str {
        match self.freq.as_deref() {
            Some("daily") => "time",
            _ => crate::DAILY_COL,
        }
    }

    /// Schema of the first frame.
    pub fn schema(&self) -> Result<SchemaRef> {
        match self.dfs.first() {
            Some(frame) => frame.schema(),
            None => Ok(Arc::new(Schema::default())),
        }
    }

    /// Column names of the first frame.
    pub fn columns(&self) -> Result<Vec<String>> {
        match self.dfs.first() {
            Some(frame) => frame.columns(),
            None => Ok(Vec::new()),
        }
    }

    /// True when the first frame has `column`.
    pub fn contains(&self, column: &str) -> Result<bool> {
        Ok(self.columns()?.iter().any(|c| c == column))
    }

    /// Iterates `(symbol, frame)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &Frame)> {
        self.dfs
            .iter()
            .enumerate()
            .map(|(i, frame)| (self.symbol_at(i), frame))
    }

    /// Symbol of the `i`-th frame.
    pub fn symbol_at(&self, i: usize) -> Option<&str> {
        self.symbols.as_ref().and_then(|s| s.get(i)).map(String::as_str)
    }

    /// Position of `symbol`. `None` when absent or when the loader is unindexed.
    pub fn find_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.as_ref()?.iter().position(|s| s == symbol)
    }

    /// Frame at position `i`.
    pub fn get(&self, i: usize) -> Option<&Frame> {
        self.dfs.get(i)
    }

    /// Frame of `symbol`.
    pub fn get_symbol(&self, symbol: &str) -> Option<&Frame> {
        self.find_index(symbol).and_then(|i| self.dfs.get(i))
    }

    /// Replaces the frame at position `i`.
    pub fn set(&mut self, i: usize, frame: impl Into<Frame>) -> Result<()> {
        let len = self.dfs.len();
        let slot = self.dfs.get_mut(i).ok_or(LoaderError::OutOfRange { index: i, len })?;
        *slot = frame.into();
        Ok(())
    }

    /// Replaces the frame of `symbol`.
    pub fn set_symbol(&mut self, symbol: &str, frame: impl Into<Frame>) -> Result<()> {
        let i = self
            .find_index(symbol)
            .ok_or_else(|| LoaderError::UnknownSymbol(symbol.to_string()))?;
        self.set(i, frame)
    }

    /// Name used in error messages and file names: the symbol, or the position.
    pub(crate) fn label_at(&self, i: usize) -> String {
        self.symbol_at(i).map_or_else(|| i.to_string(), str::to_string)
    }

    /// Runs a per-frame transform, tagging failures with the frame's symbol.
    pub(crate) fn map_frames<F>(self, f: F) -> Result<Self>
    where
        F: Fn(Option<&str>, Frame) -> Result<Frame>,
    {
        let mut dfs = Vec::with_capacity(self.dfs.len());
        for (i, frame) in self.dfs.iter().enumerate() {
            let out = f(self.symbol_at(i), frame.clone())
                .map_err(|e| LoaderError::for_symbol(self.label_at(i), e))?;
            dfs.push(out);
        }
        Ok(self.copy_with_dfs(dfs))
    }

    /// Applies a plan-level transform to every frame.
    pub fn apply<F>(self, f: F) -> Result<Self>
    where
        F: Fn(LazyFrame) -> LazyFrame,
    {
        self.map_frames(|_, frame| frame.map(&f))
    }

    /// Applies a fallible transform to every frame.
    ///
    /// Failures surface as [`LoaderError::Transform`] naming the symbol.
    pub fn try_apply<F, E>(self, f: F) -> Result<Self>
    where
        F: Fn(LazyFrame) -> std::result::Result<LazyFrame, E>,
        E: Into<LoaderError>,
    {
        self.map_frames(|_, frame| frame.try_map(|lf| f(lf).map_err(Into::into)))
    }

    /// Applies a fallible transform that also receives the frame's symbol.
    pub fn apply_with_symbol<F, E>(self, f: F) -> Result<Self>
    where
        F: Fn(Option<&str>, LazyFrame) -> std::result::Result<LazyFrame, E>,
        E: Into<LoaderError>,
    {
        self.map_frames(|symbol, frame| frame.try_map(|lf| f(symbol, lf).map_err(Into::into)))
    }

    /// Wraps multi-output expressions into one struct column when structify is on.
    pub(crate) fn parse_exprs(&self, exprs: &[Expr]) -> Vec<Expr> {
        if !self.config.auto_structify {
            return exprs.to_vec();
        }
        exprs
            .iter()
            .map(|e| {
                if !e.clone().meta().has_multiple_outputs() {
                    return e.clone();
                }
                let name = e.clone().meta().root_names().into_iter().next();
                let wrapped = as_struct(vec![e.clone()]);
                match name {
                    Some(name) => wrapped.alias(name),
                    None => wrapped,
                }
            })
            .collect()
    }

    /// Selects columns in every frame.
    pub fn select<E: AsRef<[Expr]>>(self, exprs: E) -> Result<Self> {
        let exprs = self.parse_exprs(exprs.as_ref());
        debug!(n_exprs = exprs.len(), frames = self.len(), "select");
        self.apply(|lf| lf.select(&exprs))
    }

    /// Adds or replaces columns in every frame.
    pub fn with_columns<E: AsRef<[Expr]>>(self, exprs: E) -> Result<Self> {
        let exprs = self.parse_exprs(exprs.as_ref());
        debug!(n_exprs = exprs.len(), frames = self.len(), "with_columns");
        self.apply(|lf| lf.with_columns(&exprs))
    }

    /// Adds or replaces one column in every frame.
    pub fn with_column(self, expr: Expr) -> Result<Self> {
        self.with_columns([expr])
    }

    /// Drops columns from every frame.
    pub fn drop(self, columns: &[&str]) -> Result<Self> {
        let columns: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
        self.apply(|lf| lf.drop(columns.iter().map(String::as_str)))
    }

    /// Keeps rows matching `predicate` in every frame.
    pub fn filter(self, predicate: Expr) -> Result<Self> {
        self.apply(|lf| lf.filter(predicate.clone()))
    }

    /// Sorts every frame by `by`, ascending.
    pub fn sort(self, by: &[&str]) -> Result<Self> {
        let by: Vec<PlSmallStr> = by.iter().map(|c| PlSmallStr::from(*c)).collect();
        self.apply(|lf| {
            lf.sort(
                by.clone(),
                SortMultipleOptions::default().with_maintain_order(true),
            )
        })
    }

    /// Converts every frame to a deferred plan.
    pub fn lazy(self) -> Self {
        let dfs = self.dfs.iter().cloned().map(|f| Frame::Lazy(f.lazy())).collect();
        self.copy_with_dfs(dfs)
    }

    /// Materializes every frame, in parallel across symbols.
    ///
    /// When `description` is set a progress bar labelled with it tracks the frames. On failure
    /// the error names the first failing symbol and `self` is left untouched.
    pub fn collect(&self, description: Option<&str>) -> Result<Self> {
        let pb = match description {
            Some(desc) => {
                let pb = ProgressBar::new(self.dfs.len() as u64);
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar());
                pb.set_style(style);
                pb.set_message(desc.to_string());
                pb
            }
            None => ProgressBar::hidden(),
        };
        debug!(frames = self.len(), description, "collect");
        let collected: Vec<Result<DataFrame>> = self
            .dfs
            .par_iter()
            .map(|frame| {
                let out = frame.clone().collect();
                pb.inc(1);
                out
            })
            .collect();
        pb.finish_and_clear();
        let mut dfs = Vec::with_capacity(collected.len());
        for (i, df) in collected.into_iter().enumerate() {
            let df = df.map_err(|e| LoaderError::for_symbol(self.label_at(i), e))?;
            dfs.push(Frame::Eager(df));
        }
        Ok(self.copy_with_dfs(dfs))
    }

    /// Materialized frames, collecting lazy ones.
    pub fn eager_frames(&self) -> Result<Vec<DataFrame>> {
        Ok(self
            .collect(None)?
            .dfs
            .into_iter()
            .filter_map(|f| match f {
                Frame::Eager(df) => Some(df),
                Frame::Lazy(_) => None,
            })
            .collect())
    }

    /// Stacks every frame into one plan.
    ///
    /// Frames of an indexed loader gain a `symbol` column when they lack one.
    pub fn concat(&self) -> Result<LazyFrame> {
        let lfs = self.tagged_frames("symbol", false)?;
        Ok(concat(lfs, UnionArgs::default())?)
    }

    /// Frames with a `tag_col` column added where missing. Unindexed loaders are tagged with the
    /// frame position when `tag_positions` is set.
    pub(crate) fn tagged_frames(&self, tag_col: &str, tag_positions: bool) -> Result<Vec<LazyFrame>> {
        let mut lfs = Vec::with_capacity(self.dfs.len());
        for (i, frame) in self.dfs.iter().enumerate() {
            let lf = frame.clone().lazy();
            let tag = match self.symbol_at(i) {
                Some(symbol) => Some(symbol.to_string()),
                None if tag_positions => Some(i.to_string()),
                None => None,
            };
            let lf = match tag {
                Some(tag) if !frame.columns()?.iter().any(|c| c == tag_col) => {
                    lf.with_column(lit(tag).alias(tag_col))
                }
                _ => lf,
            };
            lfs.push(lf);
        }
        Ok(lfs)
    }
}

impl Index<usize> for DataLoader {
    type Output = Frame;

    fn index(&self, i: usize) -> &Frame {
        &self.dfs[i]
    }
}

impl Index<&str> for DataLoader {
    type Output = Frame;

    fn index(&self, symbol: &str) -> &Frame {
        match self.get_symbol(symbol) {
            Some(frame) => frame,
            None => panic!("symbol {symbol} not found in DataLoader"),
        }
    }
}
