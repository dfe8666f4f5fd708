use prediction_viz::chart::{
    HISTORIC_COLOR, INNER_BAND_NAME, MEDIAN_NAME, OUTER_BAND_NAME, PredictionBands, SeriesKind,
    assemble,
};
use prediction_viz::models::{PeriodType, SeriesPoint};

fn series(values: &[(i64, f64)]) -> Vec<SeriesPoint> {
    values.iter().map(|&(t, v)| SeriesPoint::new(t, v)).collect()
}

#[test]
fn z_order_is_bands_historic_median() {
    let bands = PredictionBands {
        median: series(&[(3, 5.0), (4, 6.0)]),
        high: series(&[(3, 8.0), (4, 9.0)]),
        low: series(&[(3, 2.0), (4, 3.0)]),
        mid_high: series(&[(3, 6.0), (4, 7.0)]),
        mid_low: series(&[(3, 4.0), (4, 5.0)]),
    };
    let chart = assemble(series(&[(1, 1.0), (2, 2.0)]), "Cases", bands, PeriodType::Monthly);

    assert_eq!(chart.title, "Cases and predictions");
    let names: Vec<&str> = chart.series.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec![OUTER_BAND_NAME, INNER_BAND_NAME, "Cases", MEDIAN_NAME]);
    let z: Vec<u32> = chart.series.iter().map(|s| s.z_index).collect();
    assert_eq!(z, vec![0, 1, 2, 3]);
    assert_eq!(chart.series[0].kind, SeriesKind::Range);
    assert_eq!(chart.series[2].color, HISTORIC_COLOR);
    assert_eq!(chart.tooltip_date_format(), "%B %Y");
}

#[test]
fn historic_is_kept_even_when_empty() {
    let chart = assemble(Vec::new(), "Cases", PredictionBands::default(), PeriodType::Weekly);
    assert_eq!(chart.series.len(), 1);
    assert!(chart.series[0].data.is_empty());
    assert!(chart.is_empty());
    assert_eq!(chart.tooltip_date_format(), "Week %V, %G");
}

#[test]
fn range_needs_overlapping_bounds() {
    let bands = PredictionBands {
        high: series(&[(5, 8.0)]),
        low: series(&[(6, 2.0)]),
        ..Default::default()
    };
    let chart = assemble(series(&[(1, 1.0)]), "Cases", bands, PeriodType::Monthly);
    assert_eq!(chart.series.len(), 1);

    let only_high = PredictionBands {
        high: series(&[(5, 8.0)]),
        ..Default::default()
    };
    let chart = assemble(series(&[(1, 1.0)]), "Cases", only_high, PeriodType::Monthly);
    assert_eq!(chart.series.len(), 1);
}
