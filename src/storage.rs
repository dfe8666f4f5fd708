//! File IO for the CLI: export assembled charts, import saved analytics tables and catalogs.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use crate::chart::{Chart, SeriesData};
use crate::models::{DataElement, TabularResult};
use crate::period;

/// Spreadsheet apps evaluate cells starting with these as formulas.
fn sanitize_cell(s: &str) -> String {
    match s.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{s}"),
        _ => s.to_string(),
    }
}

/// Save every point of every series as CSV, one row per point.
///
/// Line points fill `value`; range points fill `low` and `high`.
pub fn save_chart_csv<P: AsRef<Path>>(chart: &Chart, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    wtr.write_record(["series", "period", "timestamp", "value", "low", "high"])?;
    for desc in &chart.series {
        let name = sanitize_cell(&desc.name);
        match &desc.data {
            SeriesData::Points(points) => {
                for p in points {
                    wtr.write_record([
                        name.clone(),
                        period::encode_timestamp(p.timestamp, chart.period_type),
                        p.timestamp.to_string(),
                        p.value.to_string(),
                        String::new(),
                        String::new(),
                    ])?;
                }
            }
            SeriesData::Ranges(ranges) => {
                for r in ranges {
                    wtr.write_record([
                        name.clone(),
                        period::encode_timestamp(r.timestamp, chart.period_type),
                        r.timestamp.to_string(),
                        String::new(),
                        r.low.to_string(),
                        r.high.to_string(),
                    ])?;
                }
            }
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Save the chart (title, period type, descriptors) as pretty JSON.
pub fn save_chart_json<P: AsRef<Path>>(chart: &Chart, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let s = serde_json::to_string_pretty(chart)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parse {}", path.display()))
}

/// Load an analytics response saved as JSON.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<TabularResult> {
    read_json(path.as_ref())
}

/// Load a data element catalog: either a bare array or a `{"dataElements": [...]}` page.
pub fn read_catalog<P: AsRef<Path>>(path: P) -> Result<Vec<DataElement>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Catalog {
        List(Vec<DataElement>),
        Page {
            #[serde(rename = "dataElements")]
            data_elements: Vec<DataElement>,
        },
    }
    Ok(match read_json(path.as_ref())? {
        Catalog::List(v) => v,
        Catalog::Page { data_elements } => data_elements,
    })
}
