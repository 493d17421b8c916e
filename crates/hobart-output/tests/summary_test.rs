//! Integration tests for result storage and export.

use hobart_loader::DataLoader;
use hobart_output::{
    ExportFormat, Exporter, Metric, ResultKind, ResultRef, Summary, SummaryError, to_ascii_table,
};
use polars::prelude::*;

fn labels() -> Vec<String> {
    vec!["label_1".into(), "label_10".into()]
}

fn populated() -> Summary {
    let mut s = Summary::new(vec!["size".into(), "value".into()], labels());
    let overall = |a: f64, b: f64| df!("label_1" => [a], "label_10" => [b]).unwrap();
    let symbol_ic = df!(
        "symbol" => ["A", "B"],
        "label_1" => [0.1, 0.2],
        "label_10" => [0.0, 0.2],
        "count" => [10u32, 30],
    )
    .unwrap();
    s.set_ic_overall(
        vec![Some(symbol_ic.clone()), Some(symbol_ic)],
        vec![Some(overall(0.175, 0.15)), Some(overall(-0.05, 0.02))],
    )
    .unwrap();

    let ts = df!(
        "trading_date" => [1i32, 2, 3, 4],
        "label_1" => [Some(0.1), Some(0.3), None, Some(0.2)],
        "label_10" => [Some(0.0), Some(0.1), Some(0.2), Some(0.3)],
    )
    .unwrap();
    let per_symbol = DataLoader::new(Some(vec!["A".into()]), vec![ts.clone().into()]).unwrap();
    s.set_ts_ic(
        vec![Some(ts.clone()), Some(ts)],
        Some(vec![Some(per_symbol), None]),
    )
    .unwrap();
    s.set_half_life(df!("size" => [12.0], "value" => [Option::<f64>::None]).unwrap());
    s
}

#[test]
fn test_ic_overall_table() {
    let table = populated().metric(Metric::IcOverall).unwrap();
    assert_eq!(table.height(), 2);
    let facs: Vec<Option<&str>> = table.column("fac").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(facs, vec![Some("size"), Some("value")]);
    assert_eq!(table.column("label_10").unwrap().f64().unwrap().get(1), Some(0.02));
}

#[test]
fn test_fac_attr_by_name_and_index_agree() {
    let s = populated();
    for kind in [ResultKind::SymbolIc, ResultKind::IcOverall, ResultKind::TsIc] {
        let by_name = match s.fac_attr("value", kind).unwrap() {
            ResultRef::Frame(df) => df.shape(),
            other => panic!("unexpected {other:?}"),
        };
        let by_index = match s.fac_attr(1usize, kind).unwrap() {
            ResultRef::Frame(df) => df.shape(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(by_name, by_index);
    }
    assert!(matches!(s.fac_attr("size", ResultKind::SymbolTsIc), Ok(ResultRef::Loader(_))));
    assert!(matches!(
        s.fac_attr("value", ResultKind::SymbolTsIc),
        Err(SummaryError::NotComputed(ResultKind::SymbolTsIc))
    ));
    assert!(matches!(s.fac_attr("size", ResultKind::HalfLife), Ok(ResultRef::Value(Some(v))) if v == 12.0));
    assert!(matches!(s.fac_attr("value", ResultKind::HalfLife), Ok(ResultRef::Value(None))));
}

#[test]
fn test_ic_records_export() {
    let s = populated();
    let records = s.ic_records().unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].fac, "size");
    assert_eq!(records[1].label, "label_10");
    assert!((records[0].ic.unwrap() - 0.2).abs() < 1e-12);

    let csv = records.export_to_string(ExportFormat::Csv).unwrap();
    assert_eq!(csv.lines().count(), 5);
    assert!(to_ascii_table(&records).contains("label_10"));
}

#[test]
fn test_every_metric_resolves() {
    let s = populated();
    for metric in Metric::ALL {
        let table = s.metric_by_name(&metric.to_string()).unwrap().unwrap();
        assert_eq!(table.width(), 3, "{metric}");
    }
}
