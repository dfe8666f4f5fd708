//! Per-render orchestration: chart config → query windows → analytics fetches →
//! reshape → assembly.
//!
//! The historic and the band fetch run concurrently and are both joined before any
//! merging happens; a failure in either aborts the render without a partial chart.
//! Every render holds a [`RenderTicket`]; when a newer render has started by the time
//! the fetches complete, the stale result is discarded.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::api::{AnalyticsQuery, AnalyticsSource};
use crate::chart::{self, Chart, DEFAULT_HISTORIC_LABEL, PredictionBands};
use crate::error::VizError;
use crate::models::{ChartConfig, ChartType, OrgUnitSelector, RoleAssignment, Series, TabularResult};
use crate::period;
use crate::reshape::{self, DimensionFilter};
use crate::settings::QueryWindows;

/// Generation counter shared by all renders of one dashboard item.
#[derive(Debug, Default)]
pub struct RenderSession {
    generation: AtomicU64,
}

/// Proof of which render generation a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTicket(u64);

impl RenderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new render; every earlier ticket becomes stale.
    pub fn begin(&self) -> RenderTicket {
        RenderTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: RenderTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// No historic data element is selected yet.
    NotConfigured,
    Chart(Chart),
    /// A newer render started while this one was fetching.
    Discarded,
}

/// Render `config` once, outside of any session.
pub fn render<S>(
    source: &S,
    config: &ChartConfig,
    windows: &QueryWindows,
    anchor: NaiveDate,
) -> Result<RenderOutcome>
where
    S: AnalyticsSource + Sync + ?Sized,
{
    let session = RenderSession::new();
    let ticket = session.begin();
    render_in_session(source, config, windows, anchor, &session, ticket)
}

/// Render `config` for the holder of `ticket`.
pub fn render_in_session<S>(
    source: &S,
    config: &ChartConfig,
    windows: &QueryWindows,
    anchor: NaiveDate,
    session: &RenderSession,
    ticket: RenderTicket,
) -> Result<RenderOutcome>
where
    S: AnalyticsSource + Sync + ?Sized,
{
    if config.chart_type == ChartType::Example {
        return Ok(RenderOutcome::Chart(chart::example_chart()));
    }
    let historic_id = match config.historic_id() {
        Ok(id) => id.to_string(),
        Err(VizError::ConfigIncomplete) => return Ok(RenderOutcome::NotConfigured),
        Err(e) => return Err(e.into()),
    };
    let org_units = config.org_unit_selector()?;
    let period_type = config.period_type;
    let roles = config.roles();

    let hist_window = windows.historic(period_type);
    let pred_window = windows.prediction(period_type);
    let historic_query = AnalyticsQuery {
        data_element_ids: vec![historic_id],
        periods: period::generate_periods(period_type, anchor, hist_window.before, hist_window.after),
        org_units: org_units.clone(),
    };
    let band_query = band_query(
        &roles,
        period::generate_periods(period_type, anchor, pred_window.before, pred_window.after),
        org_units,
    );

    let (historic_table, band_table) = fetch_concurrently(source, &historic_query, band_query.as_ref());

    // A superseded render is dropped whether its fetches succeeded or not.
    if !session.is_current(ticket) {
        warn!("discarding stale render {ticket:?}");
        return Ok(RenderOutcome::Discarded);
    }
    let historic_table = historic_table?;
    let band_table = band_table.transpose()?;

    let historic = reshape::reshape(&historic_table, None)?;
    let label = reshape::extract_label(&historic_table, "dx", DEFAULT_HISTORIC_LABEL);
    let bands = match &band_table {
        Some(table) => reshape_bands(table, &roles)?,
        None => PredictionBands::default(),
    };

    let chart = chart::assemble(historic, &label, bands, period_type);
    info!(
        "assembled chart {:?} with {} series",
        chart.title,
        chart.series.len()
    );
    Ok(RenderOutcome::Chart(chart))
}

fn band_query(
    roles: &RoleAssignment,
    periods: Vec<String>,
    org_units: OrgUnitSelector,
) -> Option<AnalyticsQuery> {
    let ids = roles.band_ids();
    if ids.is_empty() {
        debug!("no prediction bands configured; skipping band fetch");
        return None;
    }
    Some(AnalyticsQuery {
        data_element_ids: ids,
        periods,
        org_units,
    })
}

fn fetch_concurrently<S>(
    source: &S,
    historic: &AnalyticsQuery,
    bands: Option<&AnalyticsQuery>,
) -> (Result<TabularResult>, Option<Result<TabularResult>>)
where
    S: AnalyticsSource + Sync + ?Sized,
{
    std::thread::scope(|s| {
        let band_handle = bands.map(|q| s.spawn(move || source.analytics(q)));
        let historic = source.analytics(historic);
        let bands = band_handle.map(|h| {
            h.join()
                .unwrap_or_else(|_| Err(anyhow!("prediction band fetch panicked")))
        });
        (historic, bands)
    })
}

fn reshape_bands(table: &TabularResult, roles: &RoleAssignment) -> Result<PredictionBands> {
    let series_for = |id: Option<&str>| -> Result<Series> {
        match id {
            Some(id) => Ok(reshape::reshape(table, Some(&DimensionFilter::data_element(id)))?),
            None => Ok(Series::new()),
        }
    };
    Ok(PredictionBands {
        median: series_for(roles.median.as_deref())?,
        high: series_for(roles.high.as_deref())?,
        low: series_for(roles.low.as_deref())?,
        mid_high: series_for(roles.mid_high.as_deref())?,
        mid_low: series_for(roles.mid_low.as_deref())?,
    })
}
