//! Integration tests for the multi-symbol loader.

use chrono::NaiveDate;
use hobart_loader::{DataLoader, GroupByTimeOpt, HorizontalAgg, LoaderError};
use polars::prelude::*;
use std::path::PathBuf;

fn dates(from: u32, to: u32) -> Vec<NaiveDate> {
    (from..=to)
        .map(|d| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(u64::from(d)))
        .collect()
}

fn frame(from: u32, to: u32, scale: f64) -> DataFrame {
    let time = dates(from, to);
    let value: Vec<f64> = (from..=to).map(|d| f64::from(d) * scale).collect();
    df!("time" => time, "value" => value).unwrap()
}

fn loader() -> DataLoader {
    DataLoader::new(
        Some(vec!["AAA".into(), "BBB".into(), "CCC".into()]),
        vec![frame(0, 39, 1.0).into(), frame(10, 59, 2.0).into(), frame(30, 44, 3.0).into()],
    )
    .unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("hobart-loader-test-{}-{name}", std::process::id()))
}

#[test]
fn test_align_outer_completeness() {
    let dl = loader();
    let aligned = dl.align(&["time"], None).unwrap();
    for (symbol, frame) in aligned.iter() {
        let df = frame.as_eager().unwrap();
        assert_eq!(df.height(), 60, "symbol {symbol:?}");
    }
    // Rows only present in AAA are null for BBB and CCC.
    let bbb = aligned["BBB"].as_eager().unwrap();
    let value = bbb.column("value").unwrap().f64().unwrap();
    assert!(value.get(0).is_none());
    assert_eq!(value.get(10), Some(20.0));
    let ccc = aligned["CCC"].as_eager().unwrap();
    assert_eq!(ccc.column("value").unwrap().null_count(), 45);
}

#[test]
fn test_align_then_horizontal_first() {
    let aligned = loader().align(&["time"], None).unwrap();
    let df = aligned.horizontal_agg(&[], &HorizontalAgg::First).unwrap();
    let value = df.column("value").unwrap().f64().unwrap();
    assert_eq!(value.get(0), Some(0.0));
    assert_eq!(value.get(45), Some(90.0));
    assert_eq!(value.null_count(), 0);
}

#[test]
fn test_file_round_trip() {
    let path = temp_path("single.ipc");
    let dl = loader().with_type("coin");
    dl.save(&path).unwrap();

    let back = DataLoader::load(&path, None, true).unwrap();
    assert!(back.is_lazy());
    let back = back.collect(None).unwrap();
    assert_eq!(back.symbols(), dl.symbols());
    assert_eq!(back.typ(), Some("coin"));
    for (orig, restored) in dl.frames().iter().zip(back.frames()) {
        assert_eq!(orig.height(), restored.height());
        assert_eq!(restored.columns().unwrap(), vec!["time".to_string(), "value".to_string()]);
    }

    let subset = DataLoader::load(&path, Some(&["CCC".to_string()]), false).unwrap();
    assert_eq!(subset.len(), 1);
    assert_eq!(subset["CCC"].height(), Some(15));

    std::fs::remove_file(&path).unwrap();
    let mut meta = path.into_os_string();
    meta.push(".meta.json");
    std::fs::remove_file(meta).unwrap();
}

#[test]
fn test_dir_round_trip_with_symbol_subset() {
    let dir = temp_path("dir");
    loader().save(&dir).unwrap();
    let back = DataLoader::load(&dir, Some(&["BBB".to_string(), "AAA".to_string()]), true)
        .unwrap()
        .collect(None)
        .unwrap();
    assert_eq!(back.symbols(), Some(&["BBB".to_string(), "AAA".to_string()][..]));
    assert_eq!(back[0].height(), Some(50));
    assert!(matches!(
        DataLoader::load(&dir, Some(&["ZZZ".to_string()]), true),
        Err(LoaderError::UnknownSymbol(_))
    ));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_group_by_time_per_symbol() {
    let out = loader()
        .lazy()
        .group_by_time("1w", GroupByTimeOpt::default())
        .unwrap()
        .agg([col("value").count().alias("n")])
        .unwrap()
        .collect(Some("weekly counts"))
        .unwrap();
    let total: u32 = out["CCC"]
        .as_eager()
        .unwrap()
        .column("n")
        .unwrap()
        .u32()
        .unwrap()
        .into_iter()
        .flatten()
        .sum();
    assert_eq!(total, 15);
}
