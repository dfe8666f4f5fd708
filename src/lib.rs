//! prediction_viz
//!
//! Turns DHIS2 analytics responses into chart series: a historic line plus the
//! prediction bands (low/high, mid-low/mid-high) and median forecast for it.
//! Pairs with the `pviz` CLI.
//!
//! ### Features
//! - Generate and decode monthly (`YYYYMM`) and ISO-weekly (`YYYYWww`) period ids
//! - Reshape tabular analytics results into timestamp-ordered series
//! - Discover prediction band elements from data element codes
//! - Assemble and render charts to SVG/PNG, export as CSV or JSON
//! - Persist per-dashboard-item chart configs in the DHIS2 dataStore or a JSON file
//!
//! ### Example
//! ```no_run
//! use prediction_viz::{ChartConfig, Client, QueryWindows, RenderOutcome, period, pipeline};
//!
//! let client = Client::new("http://localhost:8080", 30)?;
//! let config = ChartConfig {
//!     historic_data: Some("fbfJHSPpUQD".into()),
//!     prediction_median: Some("cYeuwXTCPkU".into()),
//!     ..Default::default()
//! };
//! let outcome = pipeline::render(&client, &config, &QueryWindows::default(), period::today())?;
//! if let RenderOutcome::Chart(chart) = outcome {
//!     prediction_viz::viz::render_chart(&chart, "chart.svg", &Default::default())?;
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod chart;
pub mod error;
pub mod matcher;
pub mod merge;
pub mod models;
pub mod period;
pub mod pipeline;
pub mod reshape;
pub mod settings;
pub mod storage;
pub mod store;
pub mod viz;

pub use api::{AnalyticsQuery, AnalyticsSource, Client};
pub use chart::{Chart, PredictionBands, SeriesDescriptor, assemble};
pub use error::{StoreError, VizError};
pub use matcher::{MatchMode, match_related};
pub use merge::merge_range;
pub use models::{ChartConfig, DataElement, PeriodType, Role, RoleAssignment, Series, TabularResult};
pub use pipeline::{RenderOutcome, RenderSession};
pub use reshape::{DimensionFilter, reshape};
pub use settings::{QueryWindows, Settings};
pub use store::{ConfigStore, FileStore, MemoryStore};
