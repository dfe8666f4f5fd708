//! Runtime settings: server location, dataStore key, and analytics query windows.
//!
//! Settings load from an optional JSON file; absent fields keep their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::matcher::MatchMode;
use crate::models::PeriodType;

/// Periods before and after the anchor period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub before: u32,
    pub after: u32,
}

impl Window {
    pub const fn new(before: u32, after: u32) -> Self {
        Self { before, after }
    }
}

/// Query windows for the historic and the prediction fetch, per granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryWindows {
    pub monthly_historic: Window,
    pub monthly_prediction: Window,
    pub weekly_historic: Window,
    pub weekly_prediction: Window,
}

impl Default for QueryWindows {
    fn default() -> Self {
        Self {
            // Last 18 months, and a year either side for predictions.
            monthly_historic: Window::new(17, 0),
            monthly_prediction: Window::new(12, 12),
            // A year of weeks back, and 18 weeks of forecast horizon.
            weekly_historic: Window::new(52, 0),
            weekly_prediction: Window::new(52, 18),
        }
    }
}

impl QueryWindows {
    pub fn historic(&self, period_type: PeriodType) -> Window {
        match period_type {
            PeriodType::Monthly => self.monthly_historic,
            PeriodType::Weekly => self.weekly_historic,
        }
    }

    pub fn prediction(&self, period_type: PeriodType) -> Window {
        match period_type {
            PeriodType::Monthly => self.monthly_prediction,
            PeriodType::Weekly => self.weekly_prediction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// DHIS2 instance root, without the trailing `/api`.
    pub base_url: String,
    /// dataStore namespace holding the dashboard item configs.
    pub namespace: String,
    /// dataStore key inside `namespace`.
    pub key: String,
    pub match_mode: MatchMode,
    pub windows: QueryWindows,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            namespace: "PREDICTION_VISUALIZER_PLUGIN".into(),
            key: "dashboardItems".into(),
            match_mode: MatchMode::Contains,
            windows: QueryWindows::default(),
            timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read settings {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse settings {}", path.display()))
    }

    /// Settings from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"base_url": "https://dhis2.example.org", "windows": {{"weekly_prediction": {{"before": 4, "after": 8}}}}}}"#
        )
        .unwrap();
        let s = Settings::load(f.path()).unwrap();
        assert_eq!(s.base_url, "https://dhis2.example.org");
        assert_eq!(s.namespace, "PREDICTION_VISUALIZER_PLUGIN");
        assert_eq!(s.windows.prediction(PeriodType::Weekly), Window::new(4, 8));
        assert_eq!(s.windows.historic(PeriodType::Monthly), Window::new(17, 0));
    }
}
