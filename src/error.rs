//! Error taxonomy for the transformation pipeline and the config store.
//!
//! Row-level problems (`MalformedPeriod`, `MalformedValue`) are recovered by the
//! reshaper and only surface when a single value is decoded directly. Structural
//! problems (`MissingColumn`) and persistence problems are propagated to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VizError {
    /// Period string matches neither `YYYYMM` nor `YYYYWww`.
    #[error("malformed period identifier: {0:?}")]
    MalformedPeriod(String),

    /// A header required by the reshaper is absent from the result.
    #[error("missing column {0:?} in analytics result")]
    MissingColumn(String),

    /// A `value` cell could not be parsed as a finite number.
    #[error("malformed value cell: {0:?}")]
    MalformedValue(String),

    /// No historic data element is selected for the dashboard item.
    #[error("chart is not configured: no historic data element selected")]
    ConfigIncomplete,

    /// The existence probe disagreed with the outcome of the following write.
    #[error("persistence conflict for dashboard item {item}: {detail}")]
    PersistenceConflict { item: String, detail: String },

    /// Selected organisation units live on different hierarchy levels.
    #[error("organisation units must all be on the same level (found levels {0:?})")]
    InvalidOrgUnitSelection(Vec<usize>),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors reported by a [`crate::store::ConfigStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 404-class answer: the namespaced key does not exist.
    #[error("key not found")]
    NotFound,

    /// The key was created by someone else between probe and create.
    #[error("key already exists")]
    AlreadyExists,

    #[error("invalid stored document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type Result<T, E = VizError> = std::result::Result<T, E>;
