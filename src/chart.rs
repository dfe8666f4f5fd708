//! Chart assembly: compose reshaped series into the descriptor list a renderer consumes.
//!
//! Descriptors are ordered bottom-to-top: shaded prediction bands first, then the
//! historic line, then the prediction median on top.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::merge::merge_range;
use crate::models::{PeriodType, RangeSeries, Series, SeriesPoint};
use crate::period;

/// RGBA color; alpha is 0-255.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Alpha as an opacity in 0..=1.
    pub fn opacity(&self) -> f64 {
        self.a as f64 / 255.0
    }
}

impl fmt::Display for Rgba {
    /// `#rrggbb` when opaque, `rgba(r, g, b, a)` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({}, {}, {}, {:.2})", self.r, self.g, self.b, self.opacity())
        }
    }
}

pub const HISTORIC_COLOR: Rgba = Rgba::rgb(220, 38, 38); // #dc2626
pub const MEDIAN_COLOR: Rgba = Rgba::rgb(30, 64, 175); // #1e40af
pub const OUTER_BAND_COLOR: Rgba = Rgba::new(100, 149, 237, 77); // cornflower, 30%
pub const INNER_BAND_COLOR: Rgba = Rgba::new(65, 105, 225, 128); // royal blue, 50%

pub const OUTER_BAND_NAME: &str = "Prediction Range (Low-High)";
pub const INNER_BAND_NAME: &str = "Prediction Range (MidLow-MidHigh)";
pub const MEDIAN_NAME: &str = "Prediction Median";
/// Label used when the historic data element has no metadata name.
pub const DEFAULT_HISTORIC_LABEL: &str = "Historical Data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Line,
    Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesData {
    Points(Series),
    Ranges(RangeSeries),
}

impl SeriesData {
    pub fn len(&self) -> usize {
        match self {
            SeriesData::Points(s) => s.len(),
            SeriesData::Ranges(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every value carried by the series (both bounds for ranges).
    pub fn values(&self) -> Vec<f64> {
        match self {
            SeriesData::Points(s) => s.iter().map(|p| p.value).collect(),
            SeriesData::Ranges(r) => r.iter().flat_map(|p| [p.low, p.high]).collect(),
        }
    }

    pub fn timestamps(&self) -> Vec<i64> {
        match self {
            SeriesData::Points(s) => s.iter().map(|p| p.timestamp).collect(),
            SeriesData::Ranges(r) => r.iter().map(|p| p.timestamp).collect(),
        }
    }
}

/// One named series handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDescriptor {
    pub name: String,
    pub kind: SeriesKind,
    pub color: Rgba,
    pub line_width: u32,
    /// Marker radius in pixels; `None` draws no markers.
    pub marker_radius: Option<u32>,
    /// Higher values are drawn on top.
    pub z_index: u32,
    pub data: SeriesData,
}

/// Prediction series fetched for a chart; empty series are simply not drawn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionBands {
    pub median: Series,
    pub high: Series,
    pub low: Series,
    pub mid_high: Series,
    pub mid_low: Series,
}

/// A fully assembled chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub title: String,
    pub period_type: PeriodType,
    pub series: Vec<SeriesDescriptor>,
}

impl Chart {
    /// chrono format string for tooltip and axis dates.
    pub fn tooltip_date_format(&self) -> &'static str {
        tooltip_date_format(self.period_type)
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.data.is_empty())
    }
}

/// chrono format used to show a period start: `Week 05, 2024` or `January 2024`.
pub fn tooltip_date_format(period_type: PeriodType) -> &'static str {
    match period_type {
        PeriodType::Weekly => "Week %V, %G",
        PeriodType::Monthly => "%B %Y",
    }
}

/// Format a UTC millisecond timestamp with [`tooltip_date_format`].
pub fn format_timestamp(timestamp: i64, period_type: PeriodType) -> String {
    match DateTime::from_timestamp_millis(timestamp) {
        Some(dt) => dt.format(tooltip_date_format(period_type)).to_string(),
        None => period::encode_timestamp(timestamp, period_type),
    }
}

/// Compose the historic series and any prediction bands into a chart.
///
/// The historic line is always present, even when empty. The low/high band is added
/// when both bounds are non-empty and share at least one timestamp; the same applies to
/// the inner mid-low/mid-high band. The median is added when non-empty.
pub fn assemble(
    historic: Series,
    historic_label: &str,
    bands: PredictionBands,
    period_type: PeriodType,
) -> Chart {
    let mut series = Vec::with_capacity(4);

    if let Some(outer) = band(&bands.low, &bands.high) {
        series.push(range_descriptor(OUTER_BAND_NAME, OUTER_BAND_COLOR, outer));
    }
    if let Some(inner) = band(&bands.mid_low, &bands.mid_high) {
        series.push(range_descriptor(INNER_BAND_NAME, INNER_BAND_COLOR, inner));
    }
    series.push(line_descriptor(historic_label, HISTORIC_COLOR, 3, historic));
    if !bands.median.is_empty() {
        series.push(line_descriptor(MEDIAN_NAME, MEDIAN_COLOR, 4, bands.median));
    }
    for (z, d) in series.iter_mut().enumerate() {
        d.z_index = z as u32;
    }

    Chart {
        title: format!("{historic_label} and predictions"),
        period_type,
        series,
    }
}

/// Static demonstration chart (malaria deaths with three months of predictions).
pub fn example_chart() -> Chart {
    let month = |y: i32, m: u32| {
        period::decode(&format!("{y:04}{m:02}"))
            .map(|tp| tp.timestamp)
            .unwrap_or_default()
    };
    let actual = [39.0, 28.0, 22.0, 43.0, 46.0, 33.0, 22.0, 55.0, 27.0, 26.0, 44.0, 32.0];
    let historic: Series = actual
        .iter()
        .enumerate()
        .map(|(i, v)| SeriesPoint::new(month(2024, i as u32 + 1), *v))
        .collect();

    let forecast = |values: [f64; 3]| -> Series {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesPoint::new(month(2025, i as u32 + 1), *v))
            .collect()
    };
    let bands = PredictionBands {
        median: forecast([8.33, 8.67, 8.67]),
        low: forecast([5.3, 5.33, 5.67]),
        high: forecast([12.7, 12.37, 12.83]),
        mid_low: forecast([6.67, 6.58, 6.67]),
        mid_high: forecast([10.67, 10.67, 10.472]),
    };

    let mut chart = assemble(historic, "Actual Deaths", bands, PeriodType::Monthly);
    chart.title = "Malaria deaths predictions".into();
    chart
}

fn band(low: &Series, high: &Series) -> Option<RangeSeries> {
    if low.is_empty() || high.is_empty() {
        return None;
    }
    let merged = merge_range(low, high);
    (!merged.is_empty()).then_some(merged)
}

fn range_descriptor(name: &str, color: Rgba, data: RangeSeries) -> SeriesDescriptor {
    SeriesDescriptor {
        name: name.to_string(),
        kind: SeriesKind::Range,
        color,
        line_width: 0,
        marker_radius: None,
        z_index: 0,
        data: SeriesData::Ranges(data),
    }
}

fn line_descriptor(name: &str, color: Rgba, marker_radius: u32, data: Series) -> SeriesDescriptor {
    SeriesDescriptor {
        name: name.to_string(),
        kind: SeriesKind::Line,
        color,
        line_width: 2,
        marker_radius: Some(marker_radius),
        z_index: 0,
        data: SeriesData::Points(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_render_like_css() {
        assert_eq!(HISTORIC_COLOR.to_string(), "#dc2626");
        assert_eq!(MEDIAN_COLOR.to_string(), "#1e40af");
        assert_eq!(OUTER_BAND_COLOR.to_string(), "rgba(100, 149, 237, 0.30)");
    }

    #[test]
    fn tooltip_format_depends_on_granularity() {
        let ts = period::decode("2024W05").unwrap().timestamp;
        assert_eq!(format_timestamp(ts, PeriodType::Weekly), "Week 05, 2024");
        let ts = period::decode("202403").unwrap().timestamp;
        assert_eq!(format_timestamp(ts, PeriodType::Monthly), "March 2024");
    }

    #[test]
    fn example_chart_has_both_bands() {
        let chart = example_chart();
        let names: Vec<&str> = chart.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![OUTER_BAND_NAME, INNER_BAND_NAME, "Actual Deaths", MEDIAN_NAME]
        );
        assert_eq!(chart.series[2].data.len(), 12);
    }
}
