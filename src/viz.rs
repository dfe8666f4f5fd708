//! Render an assembled [`Chart`] to **SVG** or **PNG**.
//!
//! - Descriptors are painted in ascending `z_index`, so bands sit under the lines
//! - Range descriptors become a filled polygon (low forward, high reversed)
//! - Line descriptors get a stroke plus optional circle markers
//! - X ticks use the chart's tooltip date format; Y ticks are locale-grouped
//!
//! The output format follows the file extension: `.svg` for SVG, anything else bitmap.

use anyhow::{Result, anyhow, bail};
use log::info;
use num_format::{Locale, ToFormattedString};

use plotters::backend::DrawingBackend;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::series::LineSeries;
use plotters::style::FontFamily;

use plotters_bitmap::BitMapBackend;
use plotters_svg::SVGBackend;

use std::path::Path;
use std::sync::Once;

use crate::chart::{Chart, Rgba, SeriesData, SeriesDescriptor, format_timestamp};

/// `ab_glyph` does not discover OS fonts, so a "sans-serif" face is registered once.
static INIT_FONTS: Once = Once::new();

fn ensure_fonts_registered() {
    INIT_FONTS.call_once(|| {
        let _ = plotters::style::register_font(
            "sans-serif",
            plotters::style::FontStyle::Normal,
            include_bytes!("../assets/DejaVuSans.ttf"),
        );
    });
}

const ONE_DAY_MS: i64 = 86_400_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    /// Locale tag for Y tick grouping (`en`, `de`, `fr`, …).
    pub locale: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            locale: "en".into(),
        }
    }
}

/// Draw `chart` to `out_path`.
pub fn render_chart<P: AsRef<Path>>(chart: &Chart, out_path: P, opts: &RenderOptions) -> Result<()> {
    if chart.is_empty() {
        bail!("no data to plot");
    }
    ensure_fonts_registered();
    let out_path = out_path.as_ref();
    let path_string = out_path.to_string_lossy().into_owned();
    let locale = map_locale(&opts.locale);

    if out_path.extension().and_then(|s| s.to_str()) == Some("svg") {
        let root = SVGBackend::new(path_string.as_str(), (opts.width, opts.height)).into_drawing_area();
        draw_chart(root, chart, locale)?;
    } else {
        let root =
            BitMapBackend::new(path_string.as_str(), (opts.width, opts.height)).into_drawing_area();
        draw_chart(root, chart, locale)?;
    }
    info!("rendered {:?} to {}", chart.title, out_path.display());
    Ok(())
}

/// Map a locale tag onto a `num_format` locale; unknown tags fall back to English.
pub fn map_locale(tag: &str) -> &'static Locale {
    match tag.to_lowercase().as_str() {
        "de" | "de_de" | "german" => &Locale::de,
        "fr" | "fr_fr" => &Locale::fr,
        "es" | "es_es" => &Locale::es,
        "pt" | "pt_pt" | "pt_br" => &Locale::pt,
        _ => &Locale::en,
    }
}

/// Y tick text: grouped integers when whole, two decimals otherwise.
pub fn format_value(v: f64, locale: &Locale) -> String {
    if (v - v.round()).abs() < 1e-9 {
        (v.round() as i64).to_formatted_string(locale)
    } else {
        format!("{v:.2}")
    }
}

fn color(c: Rgba) -> RGBAColor {
    RGBAColor(c.r, c.g, c.b, c.opacity())
}

fn bounds(chart: &Chart) -> Result<((i64, i64), (f64, f64))> {
    let xs: Vec<i64> = chart.series.iter().flat_map(|s| s.data.timestamps()).collect();
    let ys: Vec<f64> = chart.series.iter().flat_map(|s| s.data.values()).collect();
    let x_min = *xs.iter().min().ok_or_else(|| anyhow!("no timestamps"))?;
    let x_max = *xs.iter().max().ok_or_else(|| anyhow!("no timestamps"))?;
    let (x_min, x_max) = if x_min == x_max {
        (x_min - ONE_DAY_MS, x_max + ONE_DAY_MS)
    } else {
        (x_min, x_max)
    };

    let y_max = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    // Counts start at zero; only negative data pulls the baseline down.
    let y_min = ys.iter().cloned().fold(0.0, f64::min);
    let pad = ((y_max - y_min).abs() * 0.05).max(1.0);
    Ok(((x_min, x_max), (y_min, y_max + pad)))
}

fn draw_chart<DB>(root: DrawingArea<DB, Shift>, chart: &Chart, locale: &Locale) -> Result<()>
where
    DB: DrawingBackend,
{
    let ((x_min, x_max), (y_min, y_max)) = bounds(chart)?;
    let period_type = chart.period_type;
    let x_label_fmt = |x: &i64| format_timestamp(*x, period_type);
    let y_label_fmt = |v: &f64| format_value(*v, locale);
    let points = chart.series.iter().map(|s| s.data.len()).max().unwrap_or(0);

    root.fill(&WHITE).map_err(|e| anyhow!("{:?}", e))?;

    let mut cc = ChartBuilder::on(&root)
        .margin(16)
        .caption(chart.title.as_str(), (FontFamily::SansSerif, 24))
        .set_label_area_size(LabelAreaPosition::Left, 64)
        .set_label_area_size(LabelAreaPosition::Bottom, 56)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| anyhow!("{:?}", e))?;

    cc.configure_mesh()
        .x_labels(points.clamp(2, 12))
        .y_labels(10)
        .x_label_formatter(&x_label_fmt)
        .y_label_formatter(&y_label_fmt)
        .label_style((FontFamily::SansSerif, 12))
        .axis_desc_style((FontFamily::SansSerif, 16))
        .draw()
        .map_err(|e| anyhow!("{:?}", e))?;

    let mut layers: Vec<&SeriesDescriptor> = chart.series.iter().collect();
    layers.sort_by_key(|d| d.z_index);

    for desc in layers {
        let c = color(desc.color);
        match &desc.data {
            SeriesData::Ranges(ranges) => {
                if ranges.is_empty() {
                    continue;
                }
                let poly: Vec<(i64, f64)> = ranges
                    .iter()
                    .map(|p| (p.timestamp, p.low))
                    .chain(ranges.iter().rev().map(|p| (p.timestamp, p.high)))
                    .collect();
                cc.draw_series(std::iter::once(Polygon::new(poly, c.filled())))
                    .map_err(|e| anyhow!("{:?}", e))?
                    .label(desc.name.clone())
                    .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 16, y + 5)], c.filled()));
            }
            SeriesData::Points(series) => {
                let xy: Vec<(i64, f64)> = series.iter().map(|p| (p.timestamp, p.value)).collect();
                let style = ShapeStyle {
                    color: c,
                    filled: false,
                    stroke_width: desc.line_width.max(1),
                };
                cc.draw_series(LineSeries::new(xy.clone(), style))
                    .map_err(|e| anyhow!("{:?}", e))?
                    .label(desc.name.clone())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], style));
                if let Some(r) = desc.marker_radius {
                    cc.draw_series(
                        xy.iter()
                            .map(|(x, y)| Circle::new((*x, *y), r as i32, c.filled())),
                    )
                    .map_err(|e| anyhow!("{:?}", e))?;
                }
            }
        }
    }

    cc.configure_series_labels()
        .border_style(BLACK)
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.85))
        .label_font((FontFamily::SansSerif, 14))
        .draw()
        .map_err(|e| anyhow!("{:?}", e))?;

    root.present().map_err(|e| anyhow!("{:?}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_group_by_locale() {
        assert_eq!(format_value(30000.0, map_locale("en")), "30,000");
        assert_eq!(format_value(30000.0, map_locale("de")), "30.000");
        assert_eq!(format_value(8.333, map_locale("en")), "8.33");
    }
}
