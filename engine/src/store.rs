//! Local resource store.
//!
//! [`LocalResourceStore`] is the narrow interface the replay engine mutates.
//! [`MemoryStore`] is an in-memory implementation that can be persisted
//! through [`StoreSnapshot`](crate::StoreSnapshot).

use crate::{
    error::Result, Document, EntryId, Error, JournalId, LocalResource, ResourceKind, Uid,
};
use std::collections::{BTreeMap, HashSet};

/// A uid-indexed store of local resources bound to one collection.
pub trait LocalResourceStore {
    /// The non-deleted resource with this uid, if any.
    fn find_by_uid(&self, uid: &str) -> Result<Option<LocalResource>>;

    /// Create a resource from a server document, using `etag` as version marker.
    fn create(&mut self, kind: ResourceKind, document: Document, etag: &str)
        -> Result<LocalResource>;

    /// Replace the document of an existing resource.
    fn update(&mut self, resource: &LocalResource, document: Document, etag: &str) -> Result<()>;

    /// Remove a resource. Used when the server deleted it.
    fn delete(&mut self, resource: &LocalResource) -> Result<()>;

    /// Whether [`delete`](Self::delete) is available for resources of `kind`.
    fn supports_delete(&self, _kind: ResourceKind) -> bool {
        true
    }

    /// Resources with unsynced local modifications.
    fn list_dirty(&self) -> Result<Vec<LocalResource>>;

    /// Resources deleted locally, waiting to be uploaded.
    fn list_deleted(&self) -> Result<Vec<LocalResource>>;

    /// Clear the dirty flag of resources whose content did not actually
    /// change, returning how many remain dirty.
    fn verify_dirty(&mut self) -> Result<usize>;

    /// Record that the local state of `uid` was uploaded.
    fn mark_synced(&mut self, uid: &str, etag: &str) -> Result<()>;

    /// Drop a locally deleted resource once the deletion was uploaded.
    fn purge_deleted(&mut self, uid: &str) -> Result<()>;

    /// Set the resolved members of a group.
    fn set_group_members(&mut self, group: &str, members: &[Uid]) -> Result<()>;

    /// Last journal entry applied to this store.
    fn last_entry(&self) -> Result<Option<EntryId>>;

    fn set_last_entry(&mut self, entry: &str) -> Result<()>;
}

/// In-memory store for one collection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collection: JournalId,
    resources: BTreeMap<Uid, LocalResource>,
    last_entry: Option<EntryId>,
    no_delete: HashSet<ResourceKind>,
    deletions: u64,
}

impl MemoryStore {
    /// Create an empty store bound to a collection url.
    pub fn new(collection: impl Into<JournalId>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    /// Disable server-driven deletion for a resource kind.
    pub fn without_delete(mut self, kind: ResourceKind) -> Self {
        self.no_delete.insert(kind);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Get a non-deleted resource.
    pub fn get(&self, uid: &str) -> Option<&LocalResource> {
        self.resources.get(uid).filter(|r| !r.is_deleted())
    }

    /// Get a resource including locally deleted ones.
    pub fn get_including_deleted(&self, uid: &str) -> Option<&LocalResource> {
        self.resources.get(uid)
    }

    /// Count of non-deleted resources.
    pub fn len(&self) -> usize {
        self.resources.values().filter(|r| !r.is_deleted()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-deleted resources in uid order.
    pub fn resources(&self) -> impl Iterator<Item = &LocalResource> {
        self.resources.values().filter(|r| !r.is_deleted())
    }

    /// Number of resources removed by server-driven deletes.
    pub fn deletions(&self) -> u64 {
        self.deletions
    }

    /// Add a resource through a local edit.
    pub fn insert_local(&mut self, document: Document) -> Result<()> {
        if self.get(&document.uid).is_some() {
            return Err(Error::Store(format!("resource {} already exists", document.uid)));
        }
        self.resources
            .insert(document.uid.clone(), LocalResource::new_local(document));
        Ok(())
    }

    /// Change a resource through a local edit.
    pub fn edit_local(&mut self, document: Document) -> Result<()> {
        let resource = self.active_mut(&document.uid)?;
        resource.edit(document);
        Ok(())
    }

    /// Set the dirty flag without changing content, the way a metadata-only
    /// touch by the platform does.
    pub fn touch(&mut self, uid: &str) -> Result<()> {
        self.active_mut(uid)?.state_mut().dirty = true;
        Ok(())
    }

    /// Delete a resource through a local edit.
    pub fn delete_local(&mut self, uid: &str) -> Result<()> {
        let resource = self.active_mut(uid)?;
        let state = resource.state_mut();
        state.deleted = true;
        state.dirty = true;
        Ok(())
    }

    pub(crate) fn from_parts(
        collection: JournalId,
        resources: BTreeMap<Uid, LocalResource>,
        last_entry: Option<EntryId>,
    ) -> Self {
        Self {
            collection,
            resources,
            last_entry,
            ..Self::default()
        }
    }

    pub(crate) fn parts(&self) -> (&JournalId, &BTreeMap<Uid, LocalResource>, Option<&EntryId>) {
        (&self.collection, &self.resources, self.last_entry.as_ref())
    }

    fn active_mut(&mut self, uid: &str) -> Result<&mut LocalResource> {
        self.resources
            .get_mut(uid)
            .filter(|r| !r.is_deleted())
            .ok_or_else(|| Error::Store(format!("resource not found: {}", uid)))
    }
}

impl LocalResourceStore for MemoryStore {
    fn find_by_uid(&self, uid: &str) -> Result<Option<LocalResource>> {
        Ok(self.get(uid).cloned())
    }

    fn create(
        &mut self,
        kind: ResourceKind,
        document: Document,
        etag: &str,
    ) -> Result<LocalResource> {
        if let Some(existing) = self.get(&document.uid) {
            // A kind without delete support is superseded by a resource of another kind
            let superseded = existing.kind() != kind && !self.supports_delete(existing.kind());
            if !superseded {
                return Err(Error::Store(format!("resource {} already exists", document.uid)));
            }
        }
        if ResourceKind::for_document(&document) != kind {
            return Err(Error::Store(format!(
                "document {} cannot be stored as a {}",
                document.uid, kind
            )));
        }

        let resource = LocalResource::from_server(document, etag);
        // A local tombstone with the same uid is superseded by the server
        self.resources
            .insert(resource.uid().to_string(), resource.clone());
        Ok(resource)
    }

    fn update(&mut self, resource: &LocalResource, document: Document, etag: &str) -> Result<()> {
        let stored = self.active_mut(resource.uid())?;
        if stored.kind() != resource.kind() {
            return Err(Error::Store(format!(
                "resource {} is a {}, not a {}",
                resource.uid(),
                stored.kind(),
                resource.kind()
            )));
        }
        stored.update_from_server(document, etag);
        Ok(())
    }

    fn delete(&mut self, resource: &LocalResource) -> Result<()> {
        if !self.supports_delete(resource.kind()) {
            return Err(Error::Unsupported {
                kind: resource.kind(),
                operation: "delete",
            });
        }
        if self.resources.remove(resource.uid()).is_some() {
            self.deletions += 1;
        }
        Ok(())
    }

    fn supports_delete(&self, kind: ResourceKind) -> bool {
        !self.no_delete.contains(&kind)
    }

    fn list_dirty(&self) -> Result<Vec<LocalResource>> {
        Ok(self
            .resources
            .values()
            .filter(|r| r.is_dirty() && !r.is_deleted())
            .cloned()
            .collect())
    }

    fn list_deleted(&self) -> Result<Vec<LocalResource>> {
        Ok(self
            .resources
            .values()
            .filter(|r| r.is_deleted())
            .cloned()
            .collect())
    }

    fn verify_dirty(&mut self) -> Result<usize> {
        let mut really_dirty = 0;
        for resource in self.resources.values_mut() {
            if !resource.is_dirty() || resource.is_deleted() {
                continue;
            }
            if resource.has_content_changes() {
                really_dirty += 1;
            } else {
                resource.state_mut().dirty = false;
            }
        }
        Ok(really_dirty)
    }

    fn mark_synced(&mut self, uid: &str, etag: &str) -> Result<()> {
        let resource = self.active_mut(uid)?;
        let document = resource.document().clone();
        resource.update_from_server(document, etag);
        Ok(())
    }

    fn purge_deleted(&mut self, uid: &str) -> Result<()> {
        match self.resources.get(uid) {
            Some(resource) if resource.is_deleted() => {
                self.resources.remove(uid);
                Ok(())
            }
            Some(_) => Err(Error::Store(format!("resource {} is not deleted", uid))),
            None => Ok(()),
        }
    }

    fn set_group_members(&mut self, group: &str, members: &[Uid]) -> Result<()> {
        match self.active_mut(group)? {
            LocalResource::Group(g) => {
                g.members = members.to_vec();
                Ok(())
            }
            LocalResource::Contact(_) => {
                Err(Error::Store(format!("resource {} is not a group", group)))
            }
        }
    }

    fn last_entry(&self) -> Result<Option<EntryId>> {
        Ok(self.last_entry.clone())
    }

    fn set_last_entry(&mut self, entry: &str) -> Result<()> {
        self.last_entry = Some(entry.to_string());
        Ok(())
    }
}
