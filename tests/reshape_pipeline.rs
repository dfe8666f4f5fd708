use prediction_viz::models::{RangePoint, SeriesPoint, TabularResult};
use prediction_viz::reshape::{DimensionFilter, extract_label, reshape};
use prediction_viz::{VizError, merge_range};

const ANALYTICS: &str = r#"{
  "headers": [
    {"name": "dx", "column": "Data", "valueType": "TEXT"},
    {"name": "pe", "column": "Period", "valueType": "TEXT"},
    {"name": "value", "column": "Value", "valueType": "NUMBER"}
  ],
  "metaData": {
    "items": {
      "hist": {"name": "Malaria cases"},
      "med": {"name": "Malaria cases median"},
      "202401": {"name": "January 2024"}
    },
    "dimensions": {"dx": ["hist", "med"], "pe": ["202401", "202402", "202403"], "ou": ["ImspTQPwCqd"]}
  },
  "rows": [
    ["hist", "202403", "12"],
    ["med", "202402", "8.5"],
    ["hist", "202401", "10"],
    ["hist", "202402", "11.5"],
    ["med", "202401", "7"]
  ],
  "width": 3,
  "height": 5
}"#;

fn table() -> TabularResult {
    serde_json::from_str(ANALYTICS).unwrap()
}

#[test]
fn end_to_end_monthly() {
    let t = TabularResult::from_rows(
        &["pe", "value"],
        vec![vec!["202402", "20"], vec!["202401", "10"]],
    );
    let series = reshape(&t, None).unwrap();
    assert_eq!(
        series,
        vec![
            SeriesPoint::new(1_704_067_200_000, 10.0),
            SeriesPoint::new(1_706_745_600_000, 20.0),
        ]
    );
}

#[test]
fn filtered_rows_come_out_sorted() {
    let t = table();
    let hist = reshape(&t, Some(&DimensionFilter::data_element("hist"))).unwrap();
    assert_eq!(hist.iter().map(|p| p.value).collect::<Vec<_>>(), vec![10.0, 11.5, 12.0]);
    assert!(hist.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

    let med = reshape(&t, Some(&DimensionFilter::data_element("med"))).unwrap();
    assert_eq!(med.len(), 2);

    let none = reshape(&t, Some(&DimensionFilter::data_element("other"))).unwrap();
    assert!(none.is_empty());
}

#[test]
fn label_uses_first_named_dimension_item() {
    let t = table();
    assert_eq!(extract_label(&t, "dx", "Historical Data"), "Malaria cases");
    assert_eq!(extract_label(&t, "ou", "Historical Data"), "Historical Data");
}

#[test]
fn weekly_periods_reshape() {
    let t = TabularResult::from_rows(
        &["pe", "value"],
        vec![vec!["2024W02", "3"], vec!["2023W52", "1"], vec!["2024W01", "2"]],
    );
    let s = reshape(&t, None).unwrap();
    assert_eq!(s.iter().map(|p| p.value).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    assert_eq!(s[1].timestamp, 1_704_067_200_000);
}

#[test]
fn missing_pe_column_is_reported() {
    let t = TabularResult::from_rows(&["dx", "value"], vec![vec!["a", "1"]]);
    assert!(matches!(reshape(&t, None), Err(VizError::MissingColumn(c)) if c == "pe"));
}

#[test]
fn merge_is_an_inner_join_in_high_order() {
    let low = vec![SeriesPoint::new(1, 5.0), SeriesPoint::new(2, 7.0)];
    let high = vec![SeriesPoint::new(1, 9.0), SeriesPoint::new(3, 11.0)];
    assert_eq!(
        merge_range(&low, &high),
        vec![RangePoint {
            timestamp: 1,
            low: 5.0,
            high: 9.0
        }]
    );
    assert!(merge_range(&[], &high).is_empty());
}
