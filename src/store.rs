//! Persistence of chart configs in a namespaced key-value blob.
//!
//! All dashboard items share one document (`dashboardItemId -> config`). Saving is a
//! read-modify-write: probe the key, then create it or update the merged map. Entries
//! for other dashboard items are carried over untouched, as raw JSON.

use anyhow::Context;
use log::info;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, StoreError, VizError};
use crate::models::ChartConfig;

/// The persisted blob: dashboard item id -> config document.
pub type DashboardItems = BTreeMap<String, Value>;

/// Key-value backend holding the [`DashboardItems`] document.
pub trait ConfigStore {
    /// `Ok(None)` when the key does not exist yet (404-class answer).
    fn read(&self) -> Result<Option<DashboardItems>, StoreError>;
    /// Create the key; fails with [`StoreError::AlreadyExists`] if it exists.
    fn create(&self, items: &DashboardItems) -> Result<(), StoreError>;
    /// Overwrite the key; fails with [`StoreError::NotFound`] if it is missing.
    fn update(&self, items: &DashboardItems) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// Store `config` under `item_id`, keeping every other dashboard item as it was.
pub fn save_config<S: ConfigStore + ?Sized>(
    store: &S,
    item_id: &str,
    config: &ChartConfig,
) -> Result<SaveOutcome> {
    let doc = serde_json::to_value(config).map_err(StoreError::from)?;
    match store.read()? {
        None => {
            let items = DashboardItems::from([(item_id.to_string(), doc)]);
            match store.create(&items) {
                Ok(()) => {
                    info!("created dashboard item store with {item_id}");
                    Ok(SaveOutcome::Created)
                }
                Err(StoreError::AlreadyExists) => Err(conflict(
                    item_id,
                    "store was absent on read but already existed on create",
                )),
                Err(e) => Err(e.into()),
            }
        }
        Some(mut items) => {
            items.insert(item_id.to_string(), doc);
            match store.update(&items) {
                Ok(()) => {
                    info!("updated dashboard item {item_id} ({} items stored)", items.len());
                    Ok(SaveOutcome::Updated)
                }
                Err(StoreError::NotFound) => Err(conflict(
                    item_id,
                    "store existed on read but was missing on update",
                )),
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// Config stored for `item_id`; `None` when the store or the entry does not exist.
pub fn load_config<S: ConfigStore + ?Sized>(store: &S, item_id: &str) -> Result<Option<ChartConfig>> {
    let Some(items) = store.read()? else {
        return Ok(None);
    };
    match items.get(item_id) {
        Some(doc) => {
            let cfg = ChartConfig::deserialize(doc).map_err(StoreError::from)?;
            Ok(Some(cfg))
        }
        None => Ok(None),
    }
}

fn conflict(item_id: &str, detail: &str) -> VizError {
    VizError::PersistenceConflict {
        item: item_id.to_string(),
        detail: detail.to_string(),
    }
}

/// In-process store, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<Option<DashboardItems>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: DashboardItems) -> Self {
        Self {
            doc: Mutex::new(Some(items)),
        }
    }

    /// Snapshot of the stored document.
    pub fn snapshot(&self) -> Option<DashboardItems> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<DashboardItems>> {
        // A poisoned lock still holds a consistent document; writes are single assignments.
        self.doc.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConfigStore for MemoryStore {
    fn read(&self) -> Result<Option<DashboardItems>, StoreError> {
        Ok(self.lock().clone())
    }

    fn create(&self, items: &DashboardItems) -> Result<(), StoreError> {
        let mut doc = self.lock();
        if doc.is_some() {
            return Err(StoreError::AlreadyExists);
        }
        *doc = Some(items.clone());
        Ok(())
    }

    fn update(&self, items: &DashboardItems) -> Result<(), StoreError> {
        let mut doc = self.lock();
        if doc.is_none() {
            return Err(StoreError::NotFound);
        }
        *doc = Some(items.clone());
        Ok(())
    }
}

/// Store backed by a pretty-printed JSON file. A missing file reads as "not found".
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `<config dir>/prediction-viz/dashboard-items.json`, or the working directory
    /// when the platform has no config dir.
    pub fn default_location() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("prediction-viz"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dashboard-items.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_to(&self, mut f: fs::File, items: &DashboardItems) -> Result<(), StoreError> {
        let s = serde_json::to_string_pretty(items)?;
        f.write_all(s.as_bytes())
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        Ok(())
    }
}

impl ConfigStore for FileStore {
    fn read(&self) -> Result<Option<DashboardItems>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(serde_json::from_str(&s)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("read {}", self.path.display()))
                .into()),
        }
    }

    fn create(&self, items: &DashboardItems) -> Result<(), StoreError> {
        self.ensure_parent()?;
        let f = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(StoreError::AlreadyExists),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("create {}", self.path.display()))
                    .into());
            }
        };
        self.write_to(f, items)
    }

    fn update(&self, items: &DashboardItems) -> Result<(), StoreError> {
        let f = match OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("open {}", self.path.display()))
                    .into());
            }
        };
        self.write_to(f, items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PeriodType;
    use serde_json::json;
    use tempfile::tempdir;

    fn cfg(historic: &str) -> ChartConfig {
        ChartConfig {
            historic_data: Some(historic.into()),
            ..Default::default()
        }
    }

    #[test]
    fn first_save_creates_then_updates() {
        let store = MemoryStore::new();
        assert_eq!(save_config(&store, "item1", &cfg("a")).unwrap(), SaveOutcome::Created);
        assert_eq!(save_config(&store, "item1", &cfg("b")).unwrap(), SaveOutcome::Updated);
        let got = load_config(&store, "item1").unwrap().unwrap();
        assert_eq!(got.historic_data.as_deref(), Some("b"));
    }

    #[test]
    fn save_keeps_unrelated_items_verbatim() {
        let other = json!({"chartType": "example", "somethingElse": [1, 2, 3]});
        let store = MemoryStore::with_items(DashboardItems::from([("other".to_string(), other.clone())]));
        save_config(&store, "mine", &cfg("x")).unwrap();
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.get("other"), Some(&other));
        assert!(snap.contains_key("mine"));
    }

    #[test]
    fn missing_entry_loads_as_none() {
        let store = MemoryStore::new();
        assert!(load_config(&store, "nope").unwrap().is_none());
        save_config(&store, "a", &cfg("x")).unwrap();
        assert!(load_config(&store, "nope").unwrap().is_none());
    }

    /// Reports "absent" on read but refuses to create, like a concurrent creator would.
    struct RacingStore;

    impl ConfigStore for RacingStore {
        fn read(&self) -> Result<Option<DashboardItems>, StoreError> {
            Ok(None)
        }
        fn create(&self, _: &DashboardItems) -> Result<(), StoreError> {
            Err(StoreError::AlreadyExists)
        }
        fn update(&self, _: &DashboardItems) -> Result<(), StoreError> {
            Err(StoreError::NotFound)
        }
    }

    #[test]
    fn probe_contradicted_by_write_is_a_conflict() {
        let err = save_config(&RacingStore, "item", &cfg("x")).unwrap_err();
        assert!(matches!(err, VizError::PersistenceConflict { ref item, .. } if item == "item"));
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("items.json"));
        assert!(store.read().unwrap().is_none());
        assert!(matches!(
            store.update(&DashboardItems::new()),
            Err(StoreError::NotFound)
        ));

        let mut c = cfg("hist");
        c.period_type = PeriodType::Weekly;
        save_config(&store, "item", &c).unwrap();
        assert!(matches!(
            store.create(&DashboardItems::new()),
            Err(StoreError::AlreadyExists)
        ));
        assert_eq!(load_config(&store, "item").unwrap(), Some(c));
    }
}
