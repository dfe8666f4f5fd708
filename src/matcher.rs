//! Auto-discovery of prediction band data elements from their codes.
//!
//! Prediction elements are named after the historic element they forecast, e.g. the
//! historic code `DENGUE_CASES` has bands `DENGUE_CASES_QUANTILE_HIGH`,
//! `DENGUE_CASES_CHAP_MEDIAN`, … Two vocabularies (`QUANTILE_*`, `CHAP_*`) exist and
//! are accepted on equal terms.
//!
//! Classification looks at the part of a code left over after removing the base code
//! and tests role tokens longest-first (`MID_HIGH`, `MID_LOW`, `HIGH`, `LOW`, `MEDIAN`),
//! so a `MID_HIGH` element is never claimed by the plain `HIGH` test.

use serde::{Deserialize, Serialize};

use crate::models::{ChartConfig, DataElement, PeriodType, Role, RoleAssignment};

/// Token prefixes of the two band naming vocabularies.
pub const VOCABULARIES: [&str; 2] = ["QUANTILE", "CHAP"];

/// Order in which role tokens are tested.
const PRECEDENCE: [Role; 5] = [
    Role::MidHigh,
    Role::MidLow,
    Role::High,
    Role::Low,
    Role::Median,
];

/// How a candidate code must relate to the base code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Base code appears anywhere in the candidate code.
    #[default]
    Contains,
    /// Candidate code begins with the base code.
    StartsWith,
}

/// Find the band elements related to `base_code`, one id per role.
///
/// Every role without a match is `None`. When several elements claim the same role the
/// first in catalog order wins. The element whose code equals `base_code` is ignored.
pub fn match_related(catalog: &[DataElement], base_code: &str, mode: MatchMode) -> RoleAssignment {
    let mut roles = RoleAssignment::default();
    if base_code.trim().is_empty() {
        return roles;
    }

    for de in catalog {
        let Some(code) = de.code.as_deref() else {
            continue;
        };
        if code == base_code {
            continue;
        }
        let Some(rest) = remainder(code, base_code, mode) else {
            continue;
        };
        if let Some(role) = classify(&rest) {
            let slot = roles.slot_mut(role);
            if slot.is_none() {
                *slot = Some(de.id.clone());
            }
        }
    }
    roles
}

/// Role named by `fragment`, testing longer tokens first.
///
/// A vocabulary token (`QUANTILE_<ROLE>`, `CHAP_<ROLE>`) may appear anywhere; a bare
/// `<ROLE>` only counts as the whole fragment or its last `_`-delimited segment, so
/// words like `FOLLOW` or `HIGHLANDS` name no role.
pub fn classify(fragment: &str) -> Option<Role> {
    PRECEDENCE.into_iter().find(|role| {
        let token = role.token();
        VOCABULARIES
            .iter()
            .any(|vocab| fragment.contains(&format!("{vocab}_{token}")))
            || fragment == token
            || fragment.ends_with(&format!("_{token}"))
    })
}

/// True if the element's code carries a band token of either vocabulary.
pub fn is_prediction_band_element(de: &DataElement) -> bool {
    let Some(code) = de.code.as_deref() else {
        return false;
    };
    VOCABULARIES.iter().any(|vocab| {
        Role::ALL
            .iter()
            .any(|role| code.contains(&format!("{vocab}_{}", role.token())))
    })
}

/// Catalog entries eligible as the historic series (band elements excluded).
pub fn historic_candidates(catalog: &[DataElement]) -> Vec<&DataElement> {
    catalog
        .iter()
        .filter(|de| !is_prediction_band_element(de))
        .collect()
}

/// Everything that follows from picking a historic data element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricSelection {
    pub historic_id: String,
    /// Period type of the element's dataset, when the chart can display it.
    pub period_type: Option<PeriodType>,
    pub roles: RoleAssignment,
}

/// Resolve the consequences of choosing `historic_id` from `catalog`.
///
/// Unknown ids and elements without a code select no bands.
pub fn select_historic(catalog: &[DataElement], historic_id: &str, mode: MatchMode) -> HistoricSelection {
    let element = catalog.iter().find(|de| de.id == historic_id);
    let period_type = element
        .and_then(|de| de.period_type.as_deref())
        .and_then(PeriodType::from_dataset_period_type);
    let roles = element
        .and_then(|de| de.code.as_deref())
        .map(|code| match_related(catalog, code, mode))
        .unwrap_or_default();
    HistoricSelection {
        historic_id: historic_id.to_string(),
        period_type,
        roles,
    }
}

impl ChartConfig {
    /// Assign a historic selection to the config in one step.
    pub fn apply_selection(&mut self, selection: HistoricSelection) {
        self.historic_data = Some(selection.historic_id);
        if let Some(pt) = selection.period_type {
            self.period_type = pt;
        }
        self.set_roles(selection.roles);
    }
}

fn remainder(code: &str, base: &str, mode: MatchMode) -> Option<String> {
    match mode {
        MatchMode::StartsWith => code.strip_prefix(base).map(str::to_string),
        MatchMode::Contains => code
            .find(base)
            .map(|i| format!("{}{}", &code[..i], &code[i + base.len()..])),
    }
}
