use std::fs;
use tempfile::tempdir;

use prediction_viz::chart::{PredictionBands, assemble, example_chart};
use prediction_viz::models::{PeriodType, SeriesPoint};
use prediction_viz::period::decode;
use prediction_viz::viz::{RenderOptions, render_chart};

#[test]
fn example_chart_renders_to_svg() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("chart.svg");
    render_chart(&example_chart(), &out, &RenderOptions::default()).unwrap();
    let svg = fs::read_to_string(&out).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("Malaria deaths predictions"));
}

#[test]
fn weekly_single_point_renders() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("weekly.svg");
    let ts = decode("2024W10").unwrap().timestamp;
    let chart = assemble(
        vec![SeriesPoint::new(ts, 4.0)],
        "Dengue",
        PredictionBands::default(),
        PeriodType::Weekly,
    );
    render_chart(&chart, &out, &RenderOptions::default()).unwrap();
    assert!(fs::metadata(&out).unwrap().len() > 0);
}

#[test]
fn empty_chart_is_an_error() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("empty.svg");
    let chart = assemble(Vec::new(), "Nothing", PredictionBands::default(), PeriodType::Monthly);
    assert!(render_chart(&chart, &out, &RenderOptions::default()).is_err());
}
