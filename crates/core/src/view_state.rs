// crates/core/src/view_state.rs
//! Per-list column visibility, persisted as a small JSON file.
//!
//! Entries are keyed `visibleColumns:{listId}` and hold the ordered column
//! ids the user chose to show.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ViewStateError;

pub const VIEW_STATE_FILE: &str = "view-state.json";

pub fn visible_columns_key(list_id: &str) -> String {
    format!("visibleColumns:{list_id}")
}

/// Default store location: `<data_dir>/lists-jobs/view-state.json`.
pub fn default_path() -> Result<PathBuf, ViewStateError> {
    dirs::data_dir()
        .map(|d| d.join("lists-jobs").join(VIEW_STATE_FILE))
        .ok_or(ViewStateError::DataDirNotFound)
}

#[derive(Debug, Clone)]
pub struct ColumnVisibilityStore {
    path: PathBuf,
    entries: BTreeMap<String, Vec<String>>,
}

impl ColumnVisibilityStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ViewStateError> {
        let path = path.into();
        let entries = read_entries(&path)?;
        Ok(Self { path, entries })
    }

    pub fn open_default() -> Result<Self, ViewStateError> {
        Self::open(default_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored selection for `list_id`, if any.
    pub fn load(&self, list_id: &str) -> Option<&[String]> {
        self.entries
            .get(&visible_columns_key(list_id))
            .map(Vec::as_slice)
    }

    /// Stored selection, or `defaults` when nothing usable is stored.
    pub fn resolve(&self, list_id: &str, defaults: &[String]) -> Vec<String> {
        match self.load(list_id) {
            Some(columns) if !columns.is_empty() => columns.to_vec(),
            _ => defaults.to_vec(),
        }
    }

    /// Persist a selection. An empty selection is rejected and the stored
    /// value is left as it was.
    pub fn save(&mut self, list_id: &str, columns: &[String]) -> Result<(), ViewStateError> {
        if columns.is_empty() {
            return Err(ViewStateError::EmptySelection);
        }
        let key = visible_columns_key(list_id);
        let previous = self.entries.insert(key.clone(), columns.to_vec());
        if let Err(e) = self.flush() {
            match previous {
                Some(prev) => self.entries.insert(key, prev),
                None => self.entries.remove(&key),
            };
            return Err(e);
        }
        tracing::debug!(%list_id, count = columns.len(), "saved visible columns");
        Ok(())
    }

    fn flush(&self) -> Result<(), ViewStateError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ViewStateError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            ViewStateError::MalformedJson {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| ViewStateError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| ViewStateError::io(&self.path, e))
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, Vec<String>>, ViewStateError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(ViewStateError::io(path, e)),
    };
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&raw).map_err(|e| ViewStateError::MalformedJson {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn cols(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ColumnVisibilityStore::open(dir.path().join("view-state.json")).unwrap();
        assert!(store.load("L1").is_none());
        assert_eq!(
            store.resolve("L1", &cols(&["name", "status"])),
            cols(&["name", "status"])
        );
    }

    #[test]
    fn test_save_then_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("view-state.json");
        let mut store = ColumnVisibilityStore::open(&path).unwrap();
        store.save("L1", &cols(&["barcode", "title"])).unwrap();

        let reopened = ColumnVisibilityStore::open(&path).unwrap();
        assert_eq!(reopened.load("L1"), Some(cols(&["barcode", "title"]).as_slice()));
        assert!(reopened.load("L2").is_none());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("visibleColumns:L1"));
    }

    #[test]
    fn test_empty_selection_rejected_and_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("view-state.json");
        let mut store = ColumnVisibilityStore::open(&path).unwrap();
        store.save("L1", &cols(&["barcode"])).unwrap();

        let err = store.save("L1", &[]).unwrap_err();
        assert!(matches!(err, ViewStateError::EmptySelection));
        assert_eq!(store.load("L1"), Some(cols(&["barcode"]).as_slice()));

        let reopened = ColumnVisibilityStore::open(&path).unwrap();
        assert_eq!(reopened.resolve("L1", &cols(&["x"])), cols(&["barcode"]));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("view-state.json");
        std::fs::write(&path, "{not json").unwrap();
        match ColumnVisibilityStore::open(&path) {
            Err(ViewStateError::MalformedJson { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected MalformedJson, got {other:?}"),
        }
    }

    #[test]
    fn test_key_format() {
        assert_eq!(visible_columns_key("abc-123"), "visibleColumns:abc-123");
    }
}
