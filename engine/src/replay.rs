//! Entry replay - applies a journal's entries to the local store.
//!
//! # Algorithm
//!
//! For every entry, in stream order:
//!
//! 1. Decode the content; skip entries without a document, use only the first
//! 2. Look up the local resource with the document's uid
//! 3. DELETE removes the local resource if there is one
//! 4. ADD/CHANGE updates the resource in place when its kind matches the
//!    document, otherwise replaces it with a resource of the new kind
//!
//! Group memberships are not resolved here. Every group written during
//! replay queues a [`PendingMembership`] on the session, drained by
//! [`apply_pending_memberships`] once the whole batch is stored.

use crate::{
    error::Result, Action, Document, DocumentCodec, LocalResource, LocalResourceStore,
    ResourceDownloader, ResourceKind, SyncEntry, SyncSession, Uid,
};

/// Group members waiting for the end of the batch to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMembership {
    pub group: Uid,
    pub members: Vec<Uid>,
}

/// Applies entries to one store.
pub struct Replayer<'a, S: ?Sized, C: ?Sized> {
    store: &'a mut S,
    codec: &'a C,
    downloader: &'a dyn ResourceDownloader,
}

impl<'a, S, C> Replayer<'a, S, C>
where
    S: LocalResourceStore + ?Sized,
    C: DocumentCodec + ?Sized,
{
    /// Create a replayer over a store.
    pub fn new(store: &'a mut S, codec: &'a C, downloader: &'a dyn ResourceDownloader) -> Self {
        Self {
            store,
            codec,
            downloader,
        }
    }

    pub fn store(&self) -> &S {
        self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        self.store
    }

    /// Apply one entry.
    ///
    /// Undecodable content is logged and skipped. Store errors are returned;
    /// entries applied before the failing one stay applied.
    pub fn replay(&mut self, session: &mut SyncSession, entry: &SyncEntry) -> Result<()> {
        let documents = match self.codec.decode(&entry.content, self.downloader) {
            Ok(documents) => documents,
            Err(e) if !e.is_fatal() => {
                tracing::warn!(entry = %entry.uid, "Ignoring undecodable entry: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mut documents = documents.into_iter();
        let Some(document) = documents.next() else {
            tracing::warn!(entry = %entry.uid, "Received entry without data, ignoring");
            return Ok(());
        };
        if documents.next().is_some() {
            tracing::warn!(entry = %entry.uid, "Received multiple documents, using first one");
        }

        let local = self.store.find_by_uid(&document.uid)?;

        match entry.action {
            Action::Add | Action::Change => self.upsert(session, document, local),
            Action::Delete => match local {
                Some(local) => {
                    tracing::info!(
                        "Removing local {} {} which has been deleted on the server",
                        local.kind(),
                        local.uid()
                    );
                    self.store.delete(&local)
                }
                None => {
                    tracing::warn!("Tried deleting a non-existent record: {}", document.uid);
                    Ok(())
                }
            },
        }
    }

    fn upsert(
        &mut self,
        session: &mut SyncSession,
        document: Document,
        local: Option<LocalResource>,
    ) -> Result<()> {
        let uid = document.uid.clone();

        if let Some(local) = local {
            if local.matches(&document) {
                tracing::info!("Updating {} {} in local store", local.kind(), uid);
                session.defer_membership(&document);
                self.store.update(&local, document, &uid)?;
                session.stats.updates += 1;
                return Ok(());
            }

            // The uid changed between group and individual
            if self.store.supports_delete(local.kind()) {
                tracing::info!("Local {} {} changed kind, replacing it", local.kind(), uid);
                self.store.delete(&local)?;
            } else {
                tracing::warn!(
                    "Local {} {} changed kind but cannot be deleted, superseding it",
                    local.kind(),
                    uid
                );
            }
        }

        let kind = ResourceKind::for_document(&document);
        tracing::info!("Creating local {} {}", kind, uid);
        session.defer_membership(&document);
        self.store.create(kind, document, &uid)?;
        session.stats.inserts += 1;
        Ok(())
    }
}

/// Resolve every membership queued during replay.
///
/// Members that are not (or no longer) local contacts are dropped; groups
/// that disappeared later in the batch are skipped.
pub fn apply_pending_memberships<S>(session: &mut SyncSession, store: &mut S) -> Result<()>
where
    S: LocalResourceStore + ?Sized,
{
    let pending = std::mem::take(&mut session.pending_memberships);
    if pending.is_empty() {
        return Ok(());
    }
    tracing::info!("Assigning memberships of {} downloaded groups", pending.len());

    for membership in pending {
        match store.find_by_uid(&membership.group)? {
            Some(LocalResource::Group(_)) => {}
            _ => {
                tracing::debug!(group = %membership.group, "group gone, skipping memberships");
                continue;
            }
        }

        let mut resolved = Vec::with_capacity(membership.members.len());
        for member in membership.members {
            match store.find_by_uid(&member)? {
                Some(LocalResource::Contact(_)) => resolved.push(member),
                _ => tracing::warn!(group = %membership.group, %member, "group member not found locally"),
            }
        }
        store.set_group_members(&membership.group, &resolved)?;
    }
    Ok(())
}
