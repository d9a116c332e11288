//! Local resources - the records kept in the local store.

use crate::{Document, DocumentKind, Uid};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a local resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Contact,
    Group,
}

impl ResourceKind {
    /// The kind of local resource a document materializes as.
    pub fn for_document(document: &Document) -> Self {
        match document.kind {
            DocumentKind::Individual => ResourceKind::Contact,
            DocumentKind::Group => ResourceKind::Group,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Contact => f.write_str("contact"),
            ResourceKind::Group => f.write_str("group"),
        }
    }
}

/// Sync bookkeeping shared by every resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Version marker. Journal sync stores the uid here.
    pub etag: Option<String>,
    /// Changed locally since the last sync
    pub dirty: bool,
    /// Deleted locally, waiting to be uploaded
    pub deleted: bool,
    /// Document as last exchanged with the server
    pub synced: Option<Document>,
}

impl SyncState {
    /// State of a resource just received from the server.
    pub fn from_server(document: &Document, etag: impl Into<String>) -> Self {
        Self {
            etag: Some(etag.into()),
            dirty: false,
            deleted: false,
            synced: Some(document.clone()),
        }
    }

    /// State of a resource created by a local edit.
    pub fn local() -> Self {
        Self {
            etag: None,
            dirty: true,
            deleted: false,
            synced: None,
        }
    }
}

/// An individual contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalContact {
    pub document: Document,
    pub state: SyncState,
}

/// A contact group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalGroup {
    pub document: Document,
    pub state: SyncState,
    /// Members resolved to local contacts
    #[serde(default)]
    pub members: Vec<Uid>,
}

/// A resource in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LocalResource {
    Contact(LocalContact),
    Group(LocalGroup),
}

impl LocalResource {
    /// Materialize a document received from the server.
    pub fn from_server(document: Document, etag: impl Into<String>) -> Self {
        let state = SyncState::from_server(&document, etag);
        match ResourceKind::for_document(&document) {
            ResourceKind::Contact => LocalResource::Contact(LocalContact { document, state }),
            ResourceKind::Group => LocalResource::Group(LocalGroup {
                document,
                state,
                members: Vec::new(),
            }),
        }
    }

    /// A resource created by a local edit, not yet uploaded.
    pub fn new_local(document: Document) -> Self {
        let mut resource = Self::from_server(document, String::new());
        *resource.state_mut() = SyncState::local();
        resource
    }

    pub fn uid(&self) -> &str {
        &self.document().uid
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            LocalResource::Contact(_) => ResourceKind::Contact,
            LocalResource::Group(_) => ResourceKind::Group,
        }
    }

    /// Whether a document can update this resource in place.
    pub fn matches(&self, document: &Document) -> bool {
        self.kind() == ResourceKind::for_document(document)
    }

    pub fn document(&self) -> &Document {
        match self {
            LocalResource::Contact(c) => &c.document,
            LocalResource::Group(g) => &g.document,
        }
    }

    pub fn state(&self) -> &SyncState {
        match self {
            LocalResource::Contact(c) => &c.state,
            LocalResource::Group(g) => &g.state,
        }
    }

    pub fn state_mut(&mut self) -> &mut SyncState {
        match self {
            LocalResource::Contact(c) => &mut c.state,
            LocalResource::Group(g) => &mut g.state,
        }
    }

    pub fn etag(&self) -> Option<&str> {
        self.state().etag.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.state().dirty
    }

    pub fn is_deleted(&self) -> bool {
        self.state().deleted
    }

    /// Replace the document with a version received from the server.
    pub fn update_from_server(&mut self, document: Document, etag: impl Into<String>) {
        let state = SyncState::from_server(&document, etag);
        match self {
            LocalResource::Contact(c) => {
                c.document = document;
                c.state = state;
            }
            LocalResource::Group(g) => {
                g.document = document;
                g.state = state;
            }
        }
    }

    /// Apply a local edit.
    pub fn edit(&mut self, document: Document) {
        match self {
            LocalResource::Contact(c) => c.document = document,
            LocalResource::Group(g) => g.document = document,
        }
        self.state_mut().dirty = true;
    }

    /// Whether the document differs from what was last synced.
    pub fn has_content_changes(&self) -> bool {
        self.state().synced.as_ref() != Some(self.document())
    }

    /// Resolved members, empty for contacts.
    pub fn members(&self) -> &[Uid] {
        match self {
            LocalResource::Contact(_) => &[],
            LocalResource::Group(g) => &g.members,
        }
    }
}
