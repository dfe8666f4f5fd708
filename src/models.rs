use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Result, VizError};

/// Period granularity of a chart and of the identifiers it queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    #[default]
    Monthly,
    Weekly,
}

impl PeriodType {
    /// Map a DHIS2 dataset period type (`"Monthly"`, `"Weekly"`, …) onto a chart granularity.
    /// Period types the chart cannot display (daily, quarterly, …) yield `None`.
    pub fn from_dataset_period_type(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Some(PeriodType::Monthly),
            "weekly" => Some(PeriodType::Weekly),
            _ => None,
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodType::Monthly => f.write_str("monthly"),
            PeriodType::Weekly => f.write_str("weekly"),
        }
    }
}

/// Column header of an analytics response. Only `name` is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub name: String,
}

/// `metaData` section of an analytics response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub dimensions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub items: BTreeMap<String, MetadataItem>,
}

/// Generic tabular analytics result: headers, rows of cells, and metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Cells are normalized to strings; some servers emit numbers for `value`.
    #[serde(default, deserialize_with = "de_rows")]
    pub rows: Vec<Vec<String>>,
    #[serde(rename = "metaData", default)]
    pub metadata: Metadata,
}

impl TabularResult {
    /// Build a result from header names and rows (handy for fixtures and tests).
    pub fn from_rows<I, R, S>(headers: &[&str], rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers
                .iter()
                .map(|h| Header {
                    name: (*h).to_string(),
                })
                .collect(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Into::into).collect())
                .collect(),
            metadata: Metadata::default(),
        }
    }

    /// Index of the header called `name`, if present.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.name == name)
    }
}

/// Serde helper: rows whose cells may be strings, numbers, or null.
fn de_rows<'de, D>(deserializer: D) -> std::result::Result<Vec<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct Cell(String);

    impl<'de> Deserialize<'de> for Cell {
        fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            struct CellVisitor;

            impl<'de> Visitor<'de> for CellVisitor {
                type Value = Cell;

                fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "a string, number, or null table cell")
                }

                fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
                where
                    E: de::Error,
                {
                    Ok(Cell(v.to_string()))
                }

                fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E>
                where
                    E: de::Error,
                {
                    Ok(Cell(v.to_string()))
                }

                fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E>
                where
                    E: de::Error,
                {
                    Ok(Cell(v.to_string()))
                }

                fn visit_f64<E>(self, v: f64) -> std::result::Result<Self::Value, E>
                where
                    E: de::Error,
                {
                    Ok(Cell(v.to_string()))
                }

                fn visit_unit<E>(self) -> std::result::Result<Self::Value, E>
                where
                    E: de::Error,
                {
                    Ok(Cell(String::new()))
                }
            }

            deserializer.deserialize_any(CellVisitor)
        }
    }

    let rows: Vec<Vec<Cell>> = Vec::deserialize(deserializer)?;
    Ok(rows
        .into_iter()
        .map(|r| r.into_iter().map(|c| c.0).collect())
        .collect())
}

/// One observation: UTC start-of-period in milliseconds and its value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Low/high pair at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangePoint {
    pub timestamp: i64,
    pub low: f64,
    pub high: f64,
}

/// Timestamp-ascending series without duplicate timestamps.
pub type Series = Vec<SeriesPoint>;
/// Inner join of a low and a high series on timestamp.
pub type RangeSeries = Vec<RangePoint>;

/// Catalog entry for a data element, as offered by the pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataElement {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Period type of the first dataset the element belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_type: Option<String>,
}

/// Prediction band role of a data element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    High,
    MidHigh,
    Median,
    MidLow,
    Low,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::High,
        Role::MidHigh,
        Role::Median,
        Role::MidLow,
        Role::Low,
    ];

    /// Upper-case token naming the role inside a data element code.
    pub fn token(self) -> &'static str {
        match self {
            Role::High => "HIGH",
            Role::MidHigh => "MID_HIGH",
            Role::Median => "MEDIAN",
            Role::MidLow => "MID_LOW",
            Role::Low => "LOW",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::High => "high",
            Role::MidHigh => "mid-high",
            Role::Median => "median",
            Role::MidLow => "mid-low",
            Role::Low => "low",
        };
        f.write_str(s)
    }
}

/// One optional data element id per [`Role`]. `None` means "no selection".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub high: Option<String>,
    pub mid_high: Option<String>,
    pub median: Option<String>,
    pub mid_low: Option<String>,
    pub low: Option<String>,
}

impl RoleAssignment {
    pub fn get(&self, role: Role) -> Option<&str> {
        match role {
            Role::High => self.high.as_deref(),
            Role::MidHigh => self.mid_high.as_deref(),
            Role::Median => self.median.as_deref(),
            Role::MidLow => self.mid_low.as_deref(),
            Role::Low => self.low.as_deref(),
        }
    }

    pub fn slot_mut(&mut self, role: Role) -> &mut Option<String> {
        match role {
            Role::High => &mut self.high,
            Role::MidHigh => &mut self.mid_high,
            Role::Median => &mut self.median,
            Role::MidLow => &mut self.mid_low,
            Role::Low => &mut self.low,
        }
    }

    /// Configured ids in role order, without duplicates.
    pub fn band_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for role in Role::ALL {
            if let Some(id) = self.get(role) {
                if !out.iter().any(|o| o == id) {
                    out.push(id.to_string());
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        Role::ALL.iter().all(|r| self.get(*r).is_none())
    }
}

/// Organisation unit picked in the tree, identified by its hierarchy path (`/root/child`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnit {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub path: String,
}

impl OrgUnit {
    /// Hierarchy level: number of path segments (`/a` is level 1).
    pub fn level(&self) -> usize {
        self.path.split('/').filter(|s| !s.is_empty()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnitLevel {
    pub id: String,
    pub level: u32,
}

/// Organisation unit part of an analytics query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgUnitSelector {
    pub levels: BTreeSet<u32>,
    pub ids: BTreeSet<String>,
}

/// Level used when the chart config selects no organisation units.
pub const DEFAULT_ORG_UNIT_LEVEL: u32 = 2;

impl Default for OrgUnitSelector {
    fn default() -> Self {
        Self {
            levels: BTreeSet::from([DEFAULT_ORG_UNIT_LEVEL]),
            ids: BTreeSet::new(),
        }
    }
}

impl OrgUnitSelector {
    /// Render as an `ou:` dimension value, e.g. `ou:LEVEL-2;ImspTQPwCqd`.
    pub fn to_dimension(&self) -> String {
        let parts: Vec<String> = self
            .levels
            .iter()
            .map(|l| format!("LEVEL-{l}"))
            .chain(self.ids.iter().cloned())
            .collect();
        format!("ou:{}", parts.join(";"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Custom,
    Example,
}

/// Persisted per-dashboard-item chart configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(default)]
    pub chart_type: ChartType,
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub historic_data: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub prediction_high: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub prediction_mid_high: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub prediction_median: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub prediction_mid_low: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub prediction_low: Option<String>,
    #[serde(default)]
    pub org_units: Vec<OrgUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_unit_level: Option<OrgUnitLevel>,
    #[serde(default)]
    pub period_type: PeriodType,
}

/// Serde helper: treat `""` and `null` ids as "no selection".
fn de_opt_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

impl ChartConfig {
    pub fn roles(&self) -> RoleAssignment {
        RoleAssignment {
            high: self.prediction_high.clone(),
            mid_high: self.prediction_mid_high.clone(),
            median: self.prediction_median.clone(),
            mid_low: self.prediction_mid_low.clone(),
            low: self.prediction_low.clone(),
        }
    }

    /// Replace every role at once; roles missing from `roles` become unselected.
    pub fn set_roles(&mut self, roles: RoleAssignment) {
        self.prediction_high = roles.high;
        self.prediction_mid_high = roles.mid_high;
        self.prediction_median = roles.median;
        self.prediction_mid_low = roles.mid_low;
        self.prediction_low = roles.low;
    }

    /// The historic data element, or `ConfigIncomplete` when none is selected.
    pub fn historic_id(&self) -> Result<&str> {
        self.historic_data
            .as_deref()
            .ok_or(VizError::ConfigIncomplete)
    }

    /// Organisation unit selector for analytics queries.
    ///
    /// Explicit units must all sit on the same hierarchy level. With neither units nor a
    /// level configured the selector falls back to [`DEFAULT_ORG_UNIT_LEVEL`].
    pub fn org_unit_selector(&self) -> Result<OrgUnitSelector> {
        let levels: BTreeSet<usize> = self.org_units.iter().map(OrgUnit::level).collect();
        if levels.len() > 1 {
            return Err(VizError::InvalidOrgUnitSelection(levels.into_iter().collect()));
        }
        if self.org_units.is_empty() && self.org_unit_level.is_none() {
            return Ok(OrgUnitSelector::default());
        }
        Ok(OrgUnitSelector {
            levels: self.org_unit_level.iter().map(|l| l.level).collect(),
            ids: self.org_units.iter().map(|o| o.id.clone()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_config_reads_persisted_blob() {
        let raw = r#"{
            "chartType": "custom",
            "historicData": "hist1",
            "predictionHigh": "hi",
            "predictionMidHigh": "",
            "predictionMedian": "med",
            "predictionLow": null,
            "periodType": "weekly",
            "orgUnits": [{"id": "ou1", "displayName": "North", "path": "/root/ou1"}]
        }"#;
        let cfg: ChartConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.historic_data.as_deref(), Some("hist1"));
        assert_eq!(cfg.prediction_mid_high, None);
        assert_eq!(cfg.prediction_low, None);
        assert_eq!(cfg.period_type, PeriodType::Weekly);
        assert_eq!(cfg.roles().band_ids(), vec!["hi".to_string(), "med".to_string()]);
    }

    #[test]
    fn org_unit_selector_defaults_to_level_two() {
        let cfg = ChartConfig::default();
        assert_eq!(cfg.org_unit_selector().unwrap().to_dimension(), "ou:LEVEL-2");
    }

    #[test]
    fn org_unit_selector_rejects_mixed_levels() {
        let cfg = ChartConfig {
            org_units: vec![
                OrgUnit {
                    id: "a".into(),
                    display_name: "A".into(),
                    path: "/root/a".into(),
                },
                OrgUnit {
                    id: "b".into(),
                    display_name: "B".into(),
                    path: "/root/a/b".into(),
                },
            ],
            ..Default::default()
        };
        assert!(matches!(
            cfg.org_unit_selector(),
            Err(VizError::InvalidOrgUnitSelection(levels)) if levels == vec![2, 3]
        ));
    }

    #[test]
    fn rows_accept_numeric_cells() {
        let raw = r#"{"headers":[{"name":"pe"},{"name":"value"}],"rows":[["202401", 10],["202402", null]]}"#;
        let t: TabularResult = serde_json::from_str(raw).unwrap();
        assert_eq!(t.rows[0][1], "10");
        assert_eq!(t.rows[1][1], "");
        assert_eq!(t.column("value"), Some(1));
    }
}
