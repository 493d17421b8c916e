//! Persistence of loaders as IPC files with a JSON sidecar.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{DataLoader, Frame, LoaderError, Result};

const META_FILE: &str = "__meta.json";
const SYMBOL_COL: &str = "symbol";
/// Discriminator of single-file saves whose frames have their own `symbol` column.
const TAG_COL: &str = "__frame";

/// Collection-wide metadata written next to the data files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct LoaderMeta {
    symbols: Option<Vec<String>>,
    /// Frame labels in file order, the symbols or the frame positions
    frames: Vec<String>,
    #[serde(rename = "type")]
    typ: Option<String>,
    freq: Option<String>,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    /// Discriminator column added on save and dropped on load. Files without one are split on
    /// their own `symbol` column.
    tag_col: Option<String>,
}

fn sidecar(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".meta.json");
    PathBuf::from(name)
}

fn read_meta(path: &Path) -> Result<Option<LoaderMeta>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_reader(File::open(path)?)?))
}

fn write_ipc(path: &Path, df: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path)?;
    IpcWriter::new(&mut file).finish(df)?;
    Ok(())
}

fn read_ipc(path: &Path, lazy: bool) -> Result<Frame> {
    if lazy {
        Ok(Frame::Lazy(LazyFrame::scan_ipc(path, ScanArgsIpc::default())?))
    } else {
        Ok(Frame::Eager(IpcReader::new(File::open(path)?).finish()?))
    }
}

impl DataLoader {
    fn meta(&self, tag_col: Option<&str>) -> LoaderMeta {
        LoaderMeta {
            symbols: self.symbols.clone(),
            frames: (0..self.len()).map(|i| self.label_at(i)).collect(),
            typ: self.typ.clone(),
            freq: self.freq.clone(),
            start: self.start,
            end: self.end,
            tag_col: tag_col.map(str::to_string),
        }
    }

    fn with_meta(self, meta: &LoaderMeta) -> Self {
        Self { typ: meta.typ.clone(), freq: meta.freq.clone(), start: meta.start, end: meta.end, ..self }
    }

    /// Writes the loader to `path`.
    ///
    /// A path with an extension receives one IPC file holding every frame stacked with a
    /// `symbol` discriminator column, plus `<path>.meta.json`. Frames that already carry a
    /// `symbol` column are discriminated by `__frame` instead. Any other path becomes a
    /// directory with one `<symbol>.ipc` per frame and a `__meta.json`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.extension().is_some() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut has_symbol = false;
            for (i, frame) in self.dfs.iter().enumerate() {
                let columns = frame.columns()?;
                has_symbol |= columns.iter().any(|c| c == SYMBOL_COL);
                if columns.iter().any(|c| c == TAG_COL) {
                    return Err(LoaderError::Unsupported(format!(
                        "frame {} uses the reserved column {TAG_COL}",
                        self.label_at(i)
                    )));
                }
            }
            let tag_col = if has_symbol { TAG_COL } else { SYMBOL_COL };
            let lfs = self.tagged_frames(tag_col, true)?;
            let mut df = concat(lfs, UnionArgs::default())?.collect()?;
            write_ipc(path, &mut df)?;
            serde_json::to_writer_pretty(File::create(sidecar(path))?, &self.meta(Some(tag_col)))?;
        } else {
            fs::create_dir_all(path)?;
            for (i, frame) in self.dfs.iter().enumerate() {
                let mut df = frame
                    .clone()
                    .collect()
                    .map_err(|e| LoaderError::for_symbol(self.label_at(i), e))?;
                write_ipc(&path.join(format!("{}.ipc", self.label_at(i))), &mut df)?;
            }
            serde_json::to_writer_pretty(File::create(path.join(META_FILE))?, &self.meta(None))?;
        }
        info!(path = %path.display(), frames = self.len(), "saved DataLoader");
        Ok(())
    }

    /// Reads a loader written by [`save`](Self::save).
    ///
    /// `symbols` restricts and reorders the frames. With `lazy` the files are scanned instead of
    /// read.
    pub fn load(path: impl AsRef<Path>, symbols: Option<&[String]>, lazy: bool) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), lazy, "load DataLoader");
        if path.is_dir() {
            Self::load_dir(path, symbols, lazy)
        } else if path.is_file() {
            Self::load_file(path, symbols, lazy)
        } else {
            Err(LoaderError::InvalidPath(path.display().to_string()))
        }
    }

    fn load_dir(path: &Path, symbols: Option<&[String]>, lazy: bool) -> Result<Self> {
        let meta = match read_meta(&path.join(META_FILE))? {
            Some(meta) => meta,
            None => {
                let mut frames: Vec<String> = fs::read_dir(path)?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.extension().is_some_and(|ext| ext == "ipc"))
                    .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
                    .collect();
                frames.sort();
                LoaderMeta { symbols: Some(frames.clone()), frames, ..Default::default() }
            }
        };
        let (names, out_symbols) = select_frames(&meta, symbols)?;
        let mut dfs = Vec::with_capacity(names.len());
        for name in &names {
            let file = path.join(format!("{name}.ipc"));
            if !file.exists() {
                return Err(LoaderError::UnknownSymbol(name.clone()));
            }
            dfs.push(read_ipc(&file, lazy)?);
        }
        Ok(Self::new(out_symbols, dfs)?.with_meta(&meta))
    }

    fn load_file(path: &Path, symbols: Option<&[String]>, lazy: bool) -> Result<Self> {
        let meta = read_meta(&sidecar(path))?;
        let table = read_ipc(path, lazy)?.lazy();
        let meta = match meta {
            Some(meta) => meta,
            None => {
                let has_symbol = table.clone().collect_schema()?.contains(SYMBOL_COL);
                if !has_symbol {
                    let frame = table_frame(table, lazy)?;
                    return Self::new(None, vec![frame]);
                }
                let tags = table
                    .clone()
                    .select([col(SYMBOL_COL)])
                    .unique_stable(None, UniqueKeepStrategy::First)
                    .collect()?;
                let frames: Vec<String> = tags
                    .column(SYMBOL_COL)?
                    .str()?
                    .into_iter()
                    .flatten()
                    .map(str::to_string)
                    .collect();
                LoaderMeta { symbols: Some(frames.clone()), frames, ..Default::default() }
            }
        };
        let (names, out_symbols) = select_frames(&meta, symbols)?;
        let split_col = meta.tag_col.as_deref().unwrap_or(SYMBOL_COL);
        let mut dfs = Vec::with_capacity(names.len());
        for name in &names {
            let mut lf = table.clone().filter(col(split_col).eq(lit(name.as_str())));
            if meta.tag_col.is_some() {
                lf = lf.drop([split_col]);
            }
            dfs.push(table_frame(lf, lazy)?);
        }
        Ok(Self::new(out_symbols, dfs)?.with_meta(&meta))
    }
}

fn table_frame(lf: LazyFrame, lazy: bool) -> Result<Frame> {
    if lazy { Ok(Frame::Lazy(lf)) } else { Ok(Frame::Eager(lf.collect()?)) }
}

/// Frame labels to read and the symbols of the resulting loader.
fn select_frames(
    meta: &LoaderMeta,
    symbols: Option<&[String]>,
) -> Result<(Vec<String>, Option<Vec<String>>)> {
    match symbols {
        Some(wanted) => {
            if let Some(missing) = wanted.iter().find(|s| !meta.frames.contains(s)) {
                return Err(LoaderError::UnknownSymbol(missing.clone()));
            }
            Ok((wanted.to_vec(), Some(wanted.to_vec())))
        }
        None => Ok((meta.frames.clone(), meta.symbols.clone())),
    }
}
