use std::fs;
use tempfile::tempdir;

use prediction_viz::chart::{PredictionBands, assemble, example_chart};
use prediction_viz::models::{ChartConfig, PeriodType, SeriesPoint};
use prediction_viz::storage;
use prediction_viz::store::{ConfigStore, FileStore, SaveOutcome, load_config, save_config};

#[test]
fn chart_csv_has_one_row_per_point() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chart.csv");
    let chart = example_chart();
    storage::save_chart_csv(&chart, &path).unwrap();

    let txt = fs::read_to_string(&path).unwrap();
    let mut lines = txt.lines();
    assert_eq!(lines.next(), Some("series,period,timestamp,value,low,high"));
    let points: usize = chart.series.iter().map(|s| s.data.len()).sum();
    assert_eq!(txt.lines().count(), 1 + points);
    assert!(txt.contains("Actual Deaths,202401,1704067200000,39,,"));
    assert!(txt.contains("Prediction Range (Low-High),202501,"));
}

#[test]
fn csv_series_names_cannot_become_formulas() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("evil.csv");
    let chart = assemble(
        vec![SeriesPoint::new(1_704_067_200_000, 1.0)],
        "=HYPERLINK(\"http://evil\")",
        PredictionBands::default(),
        PeriodType::Monthly,
    );
    storage::save_chart_csv(&chart, &path).unwrap();

    let mut rdr = csv::Reader::from_path(&path).unwrap();
    let rec = rdr.records().next().unwrap().unwrap();
    assert!(rec[0].starts_with("'="));
}

#[test]
fn chart_json_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chart.json");
    let chart = example_chart();
    storage::save_chart_json(&chart, &path).unwrap();
    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["title"], "Malaria deaths predictions");
    assert_eq!(v["series"][0]["kind"], "range");
    assert_eq!(v["series"].as_array().unwrap().len(), 4);
}

#[test]
fn catalog_reads_page_or_array() {
    let dir = tempdir().unwrap();
    let page = dir.path().join("page.json");
    fs::write(
        &page,
        r#"{"dataElements": [{"id": "a", "displayName": "A", "code": "A_CODE"}]}"#,
    )
    .unwrap();
    let list = dir.path().join("list.json");
    fs::write(&list, r#"[{"id": "b", "displayName": "B"}]"#).unwrap();

    assert_eq!(storage::read_catalog(&page).unwrap()[0].code.as_deref(), Some("A_CODE"));
    assert_eq!(storage::read_catalog(&list).unwrap()[0].id, "b");
}

#[test]
fn file_store_keeps_other_items() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("items.json");
    fs::write(&path, r#"{"foreign": {"anything": true}}"#).unwrap();
    let store = FileStore::new(&path);

    let cfg = ChartConfig {
        historic_data: Some("hist".into()),
        prediction_median: Some("med".into()),
        ..Default::default()
    };
    assert_eq!(save_config(&store, "mine", &cfg).unwrap(), SaveOutcome::Updated);
    assert_eq!(load_config(&store, "mine").unwrap(), Some(cfg));

    let items = store.read().unwrap().unwrap();
    assert_eq!(items["foreign"], serde_json::json!({"anything": true}));
}
