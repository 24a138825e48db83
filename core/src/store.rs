//! JSON snapshot persistence for the phrase index.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DatabaseConfig, Error, Result, Span};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of the whole index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexSnapshot {
    pub version: u32,
    pub phrases: BTreeMap<String, BTreeMap<String, Vec<Span>>>,
}

/// Load/save of index snapshots.
pub trait SnapshotStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<IndexSnapshot>>;
    fn save(&self, snapshot: &IndexSnapshot) -> Result<()>;
}

/// Snapshot stored as one JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>, file_name: &str) -> Self {
        Self {
            path: dir.as_ref().join(file_name),
        }
    }

    /// Store under `root` using the configured directory and file name.
    pub fn from_config(root: &Path, config: &DatabaseConfig) -> Self {
        Self::new(root.join(&config.dir), &config.file_name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<IndexSnapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let snapshot = serde_json::from_slice(&bytes).map_err(|e| Error::Snapshot {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        debug!(path = %self.path.display(), "snapshot loaded");
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(snapshot)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), phrases = snapshot.phrases.len(), "snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PhraseIndex;

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), "index.json");
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"), "index.json");
        let mut index = PhraseIndex::new();
        index.insert_spans("graph", "a.md", [Span::new(3, 8)]);
        store.save(&index.snapshot()).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains(r#""graph":{"a.md":[[3,8]]}"#));

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(PhraseIndex::from_snapshot(loaded).unwrap(), index);
    }

    #[test]
    fn corrupt_file_reports_snapshot_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), "index.json");
        fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(Error::Snapshot { .. })));
    }
}
