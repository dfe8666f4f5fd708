//! Reshape a tabular analytics result into a timestamp-ordered series.
//!
//! Structural problems (a missing `pe`/`value` column, or a missing filter column)
//! fail the whole call. Row-level problems (unparseable period or value, short rows)
//! drop the row and are counted in a [`ReshapeReport`].

use log::debug;

use crate::error::{Result, VizError};
use crate::models::{Series, SeriesPoint, TabularResult};
use crate::period;

/// Keep only rows whose `header` column equals `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionFilter {
    pub header: String,
    pub value: String,
}

impl DimensionFilter {
    /// Filter on the data element dimension (`dx`).
    pub fn data_element(id: impl Into<String>) -> Self {
        Self {
            header: "dx".into(),
            value: id.into(),
        }
    }
}

/// Row accounting of a reshape call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReshapeReport {
    /// Rows that passed the filter.
    pub retained: usize,
    pub malformed_periods: usize,
    pub malformed_values: usize,
    /// Rows with fewer cells than the columns they need.
    pub short_rows: usize,
}

impl ReshapeReport {
    pub fn dropped(&self) -> usize {
        self.malformed_periods + self.malformed_values + self.short_rows
    }
}

/// Convert `result` into a timestamp-ascending series, optionally filtered by one dimension.
pub fn reshape(result: &TabularResult, filter: Option<&DimensionFilter>) -> Result<Series> {
    reshape_with_report(result, filter).map(|(series, _)| series)
}

/// Like [`reshape`], also returning how many rows were dropped and why.
pub fn reshape_with_report(
    result: &TabularResult,
    filter: Option<&DimensionFilter>,
) -> Result<(Series, ReshapeReport)> {
    let pe_idx = required_column(result, "pe")?;
    let value_idx = required_column(result, "value")?;
    let filter_idx = filter
        .map(|f| required_column(result, &f.header).map(|i| (i, f.value.as_str())))
        .transpose()?;

    let mut report = ReshapeReport::default();
    let mut out: Series = Vec::with_capacity(result.rows.len());

    for row in &result.rows {
        if let Some((idx, wanted)) = filter_idx {
            match row.get(idx) {
                Some(cell) if cell == wanted => {}
                Some(_) => continue,
                None => {
                    report.short_rows += 1;
                    continue;
                }
            }
        }
        report.retained += 1;

        let (Some(pe), Some(raw_value)) = (row.get(pe_idx), row.get(value_idx)) else {
            report.short_rows += 1;
            continue;
        };
        let timestamp = match period::decode(pe) {
            Ok(tp) => tp.timestamp,
            Err(e) => {
                debug!("dropping row: {e}");
                report.malformed_periods += 1;
                continue;
            }
        };
        let value = match parse_value(raw_value) {
            Ok(v) => v,
            Err(e) => {
                debug!("dropping row for period {pe}: {e}");
                report.malformed_values += 1;
                continue;
            }
        };
        out.push(SeriesPoint::new(timestamp, value));
    }

    out.sort_by_key(|p| p.timestamp);
    if report.dropped() > 0 {
        debug!(
            "reshape kept {} of {} retained rows ({} bad periods, {} bad values, {} short rows)",
            out.len(),
            report.retained,
            report.malformed_periods,
            report.malformed_values,
            report.short_rows
        );
    }
    Ok((out, report))
}

/// Parse a `value` cell as a finite float.
pub fn parse_value(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(VizError::MalformedValue(raw.to_string())),
    }
}

/// Display name of the metadata item listed under `dimension_key`, or `fallback`.
///
/// Items are considered in the order the dimension lists them; the first one with a
/// metadata entry wins.
pub fn extract_label(result: &TabularResult, dimension_key: &str, fallback: &str) -> String {
    result
        .metadata
        .dimensions
        .get(dimension_key)
        .and_then(|ids| {
            ids.iter()
                .find_map(|id| result.metadata.items.get(id).map(|item| item.name.clone()))
        })
        .unwrap_or_else(|| fallback.to_string())
}

fn required_column(result: &TabularResult, name: &str) -> Result<usize> {
    result
        .column(name)
        .ok_or_else(|| VizError::MissingColumn(name.to_string()))
}
