//! Journal service contract.

use crate::{error::Result, EntryId, JournalId, SyncEntry};
use std::fmt;

/// Credential presented to the journal service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// A journal as listed by the server.
///
/// `content` is the decrypted, integrity-checked collection payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRef {
    pub uid: JournalId,
    pub content: Vec<u8>,
}

impl JournalRef {
    pub fn new(uid: impl Into<JournalId>, content: Vec<u8>) -> Self {
        Self {
            uid: uid.into(),
            content,
        }
    }
}

/// Access to the server's journals.
///
/// Implementations block the calling thread for the duration of each call.
pub trait JournalClient {
    /// List every journal visible to the credential.
    fn list_journals(&self, credential: &Credential) -> Result<Vec<JournalRef>>;

    /// Create a journal.
    fn put_journal(&self, credential: &Credential, journal: JournalRef) -> Result<()>;

    /// Fetch the entries of a journal after `since`, in stream order.
    /// `None` fetches from the beginning.
    fn fetch_entries(
        &self,
        credential: &Credential,
        journal: &str,
        since: Option<&str>,
    ) -> Result<Vec<SyncEntry>>;

    /// Append entries after `last`, which must be the journal's current head.
    fn put_entries(
        &self,
        credential: &Credential,
        journal: &str,
        last: Option<&str>,
        entries: &[SyncEntry],
    ) -> Result<()>;
}

/// Id for a freshly created journal or entry.
pub fn new_uid() -> EntryId {
    uuid::Uuid::new_v4().to_string()
}
