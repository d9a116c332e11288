//! Snapshot files holding the local store of each collection.

use crate::error::Result;
use jsync_engine::{MemoryStore, StoreSnapshot};
use std::fs;
use std::path::{Path, PathBuf};

/// The snapshot file of one collection, `<data_dir>/<url>.json`.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    collection: String,
    path: PathBuf,
}

impl SnapshotFile {
    pub fn for_collection(data_dir: &Path, collection: &str) -> Self {
        // Journal ids are UUIDs, anything else is made safe for a file name
        let name: String = collection
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Self {
            collection: collection.to_string(),
            path: data_dir.join(format!("{}.json", name)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store, or an empty one when no snapshot exists yet.
    pub fn load(&self) -> Result<MemoryStore> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No snapshot yet, starting empty");
            return Ok(MemoryStore::new(self.collection.clone()));
        }

        let json = fs::read_to_string(&self.path)?;
        let snapshot = StoreSnapshot::from_json(&json)?;
        if snapshot.collection != self.collection {
            return Err(jsync_engine::Error::InvalidSnapshot(format!(
                "{} holds collection {}, expected {}",
                self.path.display(),
                snapshot.collection,
                self.collection
            ))
            .into());
        }

        tracing::debug!(
            path = %self.path.display(),
            resources = snapshot.resource_count(),
            "Loaded snapshot"
        );
        Ok(MemoryStore::import_state(snapshot))
    }

    /// Write the store, replacing the previous snapshot atomically.
    pub fn save(&self, store: &MemoryStore) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let json = store.export_state().to_json_pretty()?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Saved snapshot");
        Ok(())
    }
}
