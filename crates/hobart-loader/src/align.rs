//! Row alignment of per-symbol frames on shared key columns.

use polars::prelude::*;
use tracing::{debug, warn};

use crate::{DataLoader, Frame, LoaderError, Result};

impl DataLoader {
    /// Aligns every frame on the key columns `on`.
    ///
    /// Each output frame holds the same key rows, sorted by `on`, with its own value columns
    /// filled with nulls where the symbol had no observation. `how` picks the key set: `Full`
    /// (default) keeps the union of keys, `Inner` the intersection, `Left`/`Right` the keys of the
    /// first/last frame.
    pub fn align(&self, on: &[&str], how: Option<JoinType>) -> Result<Self> {
        if self.is_empty() {
            warn!("align called on an empty DataLoader");
            return Ok(self.clone());
        }
        for (i, frame) in self.dfs.iter().enumerate() {
            let columns = frame.columns()?;
            if let Some(missing) = on.iter().find(|key| !columns.iter().any(|c| c == *key)) {
                return Err(LoaderError::Alignment {
                    frame: i,
                    reason: format!("missing key column {missing}"),
                });
            }
        }
        let keys: Vec<Expr> = on.iter().map(|c| col(*c)).collect();
        let key_names: Vec<PlSmallStr> = on.iter().map(|c| PlSmallStr::from(*c)).collect();
        let key_frame = |frame: &Frame| {
            frame
                .clone()
                .lazy()
                .select(&keys)
                .unique_stable(None, UniqueKeepStrategy::First)
        };
        let how = how.unwrap_or(JoinType::Full);
        debug!(on = ?on, how = ?how, frames = self.len(), "align");
        let all_keys = match how {
            JoinType::Full => {
                let lfs: Vec<LazyFrame> = self.dfs.iter().map(key_frame).collect();
                concat(lfs, UnionArgs::default())?.unique_stable(None, UniqueKeepStrategy::First)
            }
            JoinType::Inner => {
                let mut frames = self.dfs.iter().map(key_frame);
                let first = frames.next().ok_or_else(|| LoaderError::Alignment {
                    frame: 0,
                    reason: "no frames".into(),
                })?;
                frames.fold(first, |acc, lf| {
                    acc.join(lf, &keys, &keys, JoinArgs::new(JoinType::Inner))
                })
            }
            JoinType::Left => self.dfs.first().map(key_frame).ok_or_else(|| {
                LoaderError::Alignment { frame: 0, reason: "no frames".into() }
            })?,
            JoinType::Right => self.dfs.last().map(key_frame).ok_or_else(|| {
                LoaderError::Alignment { frame: self.len(), reason: "no frames".into() }
            })?,
            other => {
                return Err(LoaderError::Unsupported(format!("align with join type {other:?}")));
            }
        }
        .sort(key_names.clone(), SortMultipleOptions::default().with_maintain_order(true));

        let dfs = self
            .dfs
            .iter()
            .map(|frame| {
                let lf = all_keys
                    .clone()
                    .join(frame.clone().lazy(), &keys, &keys, JoinArgs::new(JoinType::Left))
                    .sort(key_names.clone(), SortMultipleOptions::default().with_maintain_order(true));
                Frame::Lazy(lf)
            })
            .collect();
        let aligned = self.copy_with_dfs(dfs);
        if self.is_eager() { aligned.collect(None) } else { Ok(aligned) }
    }
}
