//! Snapshot types for persisting and restoring a [`MemoryStore`].
//!
//! Snapshots use `BTreeMap` so serialization order is deterministic.

use crate::{error::Result, EntryId, Error, JournalId, LocalResource, MemoryStore, Uid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time snapshot of one collection's local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Collection (journal) the store is bound to
    pub collection: JournalId,
    /// Last applied journal entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_entry: Option<EntryId>,
    /// All resources by uid, including local tombstones
    pub resources: BTreeMap<Uid, LocalResource>,
}

impl StoreSnapshot {
    /// Create a new empty snapshot.
    pub fn new(collection: impl Into<JournalId>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            collection: collection.into(),
            last_entry: None,
            resources: BTreeMap::new(),
        }
    }

    /// Count resources, including local tombstones.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        if let Some((uid, _)) = snapshot
            .resources
            .iter()
            .find(|(uid, r)| r.uid() != uid.as_str())
        {
            return Err(Error::InvalidSnapshot(format!(
                "resource stored under mismatching uid {}",
                uid
            )));
        }

        Ok(snapshot)
    }
}

impl MemoryStore {
    /// Export the current store state as a snapshot.
    pub fn export_state(&self) -> StoreSnapshot {
        let (collection, resources, last_entry) = self.parts();
        StoreSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            collection: collection.clone(),
            last_entry: last_entry.cloned(),
            resources: resources.clone(),
        }
    }

    /// Rebuild a store from a snapshot.
    pub fn import_state(snapshot: StoreSnapshot) -> Self {
        MemoryStore::from_parts(snapshot.collection, snapshot.resources, snapshot.last_entry)
    }
}
