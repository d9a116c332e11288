//! Sync session lifecycle.
//!
//! A session synchronizes one collection of one account:
//!
//! ```text
//! PREPARE -> (not ready: STOP) -> PULL/REPLAY -> PUSH-DIRTY -> POST-PROCESS -> DONE
//! ```
//!
//! All state that flows between phases lives in [`SyncSession`], which each
//! phase function receives by reference. A failing phase aborts the session;
//! store mutations already made by earlier entries are kept.

use crate::{
    error::Result, journal::new_uid, replay::apply_pending_memberships, Action, CollectionInfo,
    Credential, Document, DocumentCodec, EntryId, JournalClient, JournalId, LocalResourceStore,
    PendingMembership, Replayer, ResourceDownloader, SyncEntry,
};
use serde::{Deserialize, Serialize};

/// Why a session was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncTrigger {
    /// Regular two-way sync
    #[default]
    Full,
    /// Requested only to upload local changes
    UploadOnly,
}

/// Change counters of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub inserts: u64,
    pub updates: u64,
}

/// Context threaded through the phases of one session.
#[derive(Debug, Clone)]
pub struct SyncSession {
    pub account: String,
    pub collection: CollectionInfo,
    pub trigger: SyncTrigger,
    pub stats: SyncStats,
    pub pending_memberships: Vec<PendingMembership>,
}

impl SyncSession {
    pub fn new(account: impl Into<String>, collection: CollectionInfo) -> Self {
        Self {
            account: account.into(),
            collection,
            trigger: SyncTrigger::Full,
            stats: SyncStats::default(),
            pending_memberships: Vec::new(),
        }
    }

    pub fn with_trigger(mut self, trigger: SyncTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Queue the members of a group document for resolution after replay.
    pub fn defer_membership(&mut self, document: &Document) {
        if document.is_group() {
            self.pending_memberships.push(PendingMembership {
                group: document.uid.clone(),
                members: document.members.clone(),
            });
        }
    }
}

/// The journal backing a session's collection.
pub struct BoundJournal<'a, J: ?Sized> {
    client: &'a J,
    credential: &'a Credential,
    id: JournalId,
}

impl<'a, J: JournalClient + ?Sized> BoundJournal<'a, J> {
    pub fn new(client: &'a J, credential: &'a Credential, id: impl Into<JournalId>) -> Self {
        Self {
            client,
            credential,
            id: id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn fetch(&self, since: Option<&str>) -> Result<Vec<SyncEntry>> {
        self.client.fetch_entries(self.credential, &self.id, since)
    }

    fn append(&self, last: Option<&str>, entries: &[SyncEntry]) -> Result<()> {
        self.client
            .put_entries(self.credential, &self.id, last, entries)
    }
}

/// Check whether the session has work to do and bind its journal.
///
/// An upload-only session with nothing genuinely dirty and nothing deleted
/// returns `None` without touching the network.
pub fn prepare<'a, J, S>(
    session: &SyncSession,
    client: &'a J,
    credential: &'a Credential,
    store: &mut S,
) -> Result<Option<BoundJournal<'a, J>>>
where
    J: JournalClient + ?Sized,
    S: LocalResourceStore + ?Sized,
{
    if session.trigger == SyncTrigger::UploadOnly {
        let really_dirty = store.verify_dirty()?;
        let deleted = store.list_deleted()?.len();
        if really_dirty == 0 && deleted == 0 {
            tracing::info!(
                "This sync was called to up-sync dirty/deleted resources, but nothing has been changed"
            );
            return Ok(None);
        }
    }

    Ok(Some(BoundJournal::new(
        client,
        credential,
        session.collection.url.clone(),
    )))
}

/// Fetch new entries and replay them in order. Returns the number fetched.
pub fn pull<J, S, C>(
    session: &mut SyncSession,
    journal: &BoundJournal<'_, J>,
    replayer: &mut Replayer<'_, S, C>,
) -> Result<usize>
where
    J: JournalClient + ?Sized,
    S: LocalResourceStore + ?Sized,
    C: DocumentCodec + ?Sized,
{
    let since = replayer.store().last_entry()?;
    let entries = journal.fetch(since.as_deref())?;
    tracing::info!(journal = journal.id(), "Fetched {} entries", entries.len());

    for entry in &entries {
        replayer.replay(session, entry)?;
        replayer.store_mut().set_last_entry(&entry.uid)?;
    }
    Ok(entries.len())
}

/// Upload local changes as new entries. Returns the number uploaded.
pub fn push_dirty<J, S, C>(
    session: &SyncSession,
    journal: &BoundJournal<'_, J>,
    store: &mut S,
    codec: &C,
) -> Result<usize>
where
    J: JournalClient + ?Sized,
    S: LocalResourceStore + ?Sized,
    C: DocumentCodec + ?Sized,
{
    if session.collection.read_only {
        tracing::info!(journal = journal.id(), "Collection is read-only, not uploading");
        return Ok(0);
    }

    let dirty = store.list_dirty()?;
    let deleted = store.list_deleted()?;

    let mut entries = Vec::with_capacity(dirty.len() + deleted.len());
    let mut synced = Vec::with_capacity(dirty.len());
    for resource in &dirty {
        let action = if resource.state().synced.is_none() {
            Action::Add
        } else {
            Action::Change
        };
        entries.push(SyncEntry::new(new_uid(), action, codec.encode(resource.document())));
        synced.push(resource.uid().to_string());
    }

    let mut purged = Vec::with_capacity(deleted.len());
    for resource in &deleted {
        // Never uploaded, the server has nothing to delete
        if resource.state().synced.is_some() {
            entries.push(SyncEntry::new(
                new_uid(),
                Action::Delete,
                codec.encode(resource.document()),
            ));
        }
        purged.push(resource.uid().to_string());
    }

    if !entries.is_empty() {
        let last: Option<EntryId> = store.last_entry()?;
        journal.append(last.as_deref(), &entries)?;
        tracing::info!(journal = journal.id(), "Uploaded {} entries", entries.len());
    }

    for uid in &synced {
        store.mark_synced(uid, uid)?;
    }
    for uid in &purged {
        store.purge_deleted(uid)?;
    }
    if let Some(entry) = entries.last() {
        store.set_last_entry(&entry.uid)?;
    }
    Ok(entries.len())
}

/// Resolve relationships deferred during replay.
pub fn post_process<S>(session: &mut SyncSession, store: &mut S) -> Result<()>
where
    S: LocalResourceStore + ?Sized,
{
    apply_pending_memberships(session, store)
}

/// Summary of a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOutcome {
    pub stats: SyncStats,
    pub pulled: usize,
    pub pushed: usize,
    /// Whether PREPARE stopped the session early
    pub skipped: bool,
}

/// Run every phase of a session.
pub fn run_session<J, S, C>(
    session: &mut SyncSession,
    client: &J,
    credential: &Credential,
    store: &mut S,
    codec: &C,
    downloader: &dyn ResourceDownloader,
) -> Result<SessionOutcome>
where
    J: JournalClient + ?Sized,
    S: LocalResourceStore + ?Sized,
    C: DocumentCodec + ?Sized,
{
    tracing::info!(
        account = %session.account,
        journal = %session.collection.url,
        "Sync of {} has been initiated",
        session.collection.display_name
    );
    session.stats = SyncStats::default();

    let Some(journal) = prepare(session, client, credential, store)? else {
        return Ok(SessionOutcome {
            skipped: true,
            ..SessionOutcome::default()
        });
    };

    let pulled = {
        let mut replayer = Replayer::new(&mut *store, codec, downloader);
        pull(session, &journal, &mut replayer)?
    };
    let pushed = push_dirty(session, &journal, store, codec)?;
    post_process(session, store)?;

    tracing::info!(
        inserts = session.stats.inserts,
        updates = session.stats.updates,
        "Sync finished"
    );
    Ok(SessionOutcome {
        stats: session.stats,
        pulled,
        pushed,
        skipped: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec_for, MemoryStore, NoopDownloader, ServiceType, VCardCodec};
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeJournal {
        entries: RefCell<Vec<SyncEntry>>,
        fetches: RefCell<Vec<Option<String>>>,
    }

    impl JournalClient for FakeJournal {
        fn list_journals(&self, _: &Credential) -> Result<Vec<crate::JournalRef>> {
            Ok(Vec::new())
        }

        fn put_journal(&self, _: &Credential, _: crate::JournalRef) -> Result<()> {
            Ok(())
        }

        fn fetch_entries(&self, _: &Credential, _: &str, since: Option<&str>) -> Result<Vec<SyncEntry>> {
            self.fetches.borrow_mut().push(since.map(str::to_string));
            let entries = self.entries.borrow();
            let start = match since {
                Some(since) => entries
                    .iter()
                    .position(|e| e.uid == since)
                    .map_or(0, |i| i + 1),
                None => 0,
            };
            Ok(entries[start..].to_vec())
        }

        fn put_entries(&self, _: &Credential, _: &str, last: Option<&str>, entries: &[SyncEntry]) -> Result<()> {
            let mut stored = self.entries.borrow_mut();
            assert_eq!(last, stored.last().map(|e| e.uid.as_str()));
            stored.extend_from_slice(entries);
            Ok(())
        }
    }

    fn contacts() -> CollectionInfo {
        CollectionInfo::new(ServiceType::AddressBook, "Contacts").with_url("journal-1")
    }

    fn vcard(uid: &str, name: &str) -> String {
        format!("BEGIN:VCARD\r\nUID:{}\r\nFN:{}\r\nEND:VCARD\r\n", uid, name)
    }

    fn run(session: &mut SyncSession, journal: &FakeJournal, store: &mut MemoryStore) -> SessionOutcome {
        run_session(
            session,
            journal,
            &Credential::new("token"),
            store,
            &VCardCodec,
            &NoopDownloader,
        )
        .unwrap()
    }

    #[test]
    fn upload_only_without_changes_short_circuits() {
        let journal = FakeJournal::default();
        let mut store = MemoryStore::new("journal-1");
        store
            .create(crate::ResourceKind::Contact, Document::individual("c-1", "Alice"), "c-1")
            .unwrap();
        store.touch("c-1").unwrap();

        let mut session = SyncSession::new("alice", contacts()).with_trigger(SyncTrigger::UploadOnly);
        let outcome = run(&mut session, &journal, &mut store);

        assert!(outcome.skipped);
        assert!(journal.fetches.borrow().is_empty());
        assert!(store.list_dirty().unwrap().is_empty());
    }

    #[test]
    fn upload_only_with_changes_runs() {
        let journal = FakeJournal::default();
        let mut store = MemoryStore::new("journal-1");
        store.insert_local(Document::individual("c-1", "Alice")).unwrap();

        let mut session = SyncSession::new("alice", contacts()).with_trigger(SyncTrigger::UploadOnly);
        let outcome = run(&mut session, &journal, &mut store);

        assert!(!outcome.skipped);
        assert_eq!(outcome.pushed, 1);
        assert_eq!(journal.entries.borrow()[0].action, Action::Add);
    }

    #[test]
    fn pull_advances_cursor() {
        let journal = FakeJournal::default();
        journal.entries.borrow_mut().extend([
            SyncEntry::new("e1", Action::Add, vcard("c-1", "Alice")),
            SyncEntry::new("e2", Action::Add, vcard("c-2", "Bob")),
        ]);
        let mut store = MemoryStore::new("journal-1");

        let mut session = SyncSession::new("alice", contacts());
        let outcome = run(&mut session, &journal, &mut store);
        assert_eq!(outcome.pulled, 2);
        assert_eq!(outcome.stats.inserts, 2);
        assert_eq!(store.last_entry().unwrap().as_deref(), Some("e2"));

        journal
            .entries
            .borrow_mut()
            .push(SyncEntry::new("e3", Action::Change, vcard("c-1", "Alice Smith")));
        let outcome = run(&mut session, &journal, &mut store);
        assert_eq!(outcome.pulled, 1);
        assert_eq!(outcome.stats, SyncStats { inserts: 0, updates: 1 });
        assert_eq!(
            journal.fetches.borrow().last().cloned().flatten().as_deref(),
            Some("e2")
        );
    }

    #[test]
    fn push_uploads_changes_and_deletions() {
        let journal = FakeJournal::default();
        journal
            .entries
            .borrow_mut()
            .push(SyncEntry::new("e1", Action::Add, vcard("c-1", "Alice")));
        let mut store = MemoryStore::new("journal-1");
        let mut session = SyncSession::new("alice", contacts());
        run(&mut session, &journal, &mut store);

        store.edit_local(Document::individual("c-1", "Alice Smith")).unwrap();
        store.insert_local(Document::individual("c-2", "Bob")).unwrap();
        store.insert_local(Document::individual("c-3", "Never uploaded")).unwrap();
        store.delete_local("c-3").unwrap();

        let outcome = run(&mut session, &journal, &mut store);
        assert_eq!(outcome.pushed, 2);

        let actions: Vec<_> = journal.entries.borrow().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![Action::Add, Action::Change, Action::Add]);
        assert!(store.list_dirty().unwrap().is_empty());
        assert!(store.list_deleted().unwrap().is_empty());
        assert_eq!(
            store.last_entry().unwrap(),
            journal.entries.borrow().last().map(|e| e.uid.clone())
        );

        store.delete_local("c-2").unwrap();
        run(&mut session, &journal, &mut store);
        assert_eq!(journal.entries.borrow().last().unwrap().action, Action::Delete);
    }

    #[test]
    fn read_only_collections_do_not_push() {
        let journal = FakeJournal::default();
        let mut store = MemoryStore::new("journal-1");
        store.insert_local(Document::individual("c-1", "Alice")).unwrap();

        let mut info = contacts();
        info.read_only = true;
        let mut session = SyncSession::new("alice", info);
        let outcome = run(&mut session, &journal, &mut store);

        assert_eq!(outcome.pushed, 0);
        assert!(journal.entries.borrow().is_empty());
        assert_eq!(store.list_dirty().unwrap().len(), 1);
    }

    #[test]
    fn post_process_assigns_memberships() {
        let journal = FakeJournal::default();
        journal.entries.borrow_mut().extend([
            SyncEntry::new(
                "e1",
                Action::Add,
                "BEGIN:VCARD\r\nUID:g-1\r\nFN:Team\r\nKIND:group\r\nMEMBER:urn:uuid:c-1\r\nEND:VCARD\r\n",
            ),
            SyncEntry::new("e2", Action::Add, vcard("c-1", "Alice")),
        ]);
        let mut store = MemoryStore::new("journal-1");
        let mut session = SyncSession::new("alice", contacts());

        run(&mut session, &journal, &mut store);
        assert_eq!(store.get("g-1").unwrap().members(), &["c-1".to_string()]);
    }

    #[test]
    fn calendar_entries_are_replayed() {
        let event = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:ev-1\r\nSUMMARY:Standup\r\nDTSTART:20240101T090000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let journal = FakeJournal::default();
        journal
            .entries
            .borrow_mut()
            .push(SyncEntry::new("e1", Action::Add, event));
        let info = CollectionInfo::new(ServiceType::Calendar, "Work").with_url("journal-1");
        let mut store = MemoryStore::new("journal-1");
        let mut session = SyncSession::new("alice", info);

        let outcome = run_session(
            &mut session,
            &journal,
            &Credential::new("token"),
            &mut store,
            codec_for(ServiceType::Calendar),
            &NoopDownloader,
        )
        .unwrap();

        assert_eq!(outcome.stats.inserts, 1);
        assert_eq!(store.last_entry().unwrap().as_deref(), Some("e1"));
        let stored = store.get("ev-1").unwrap();
        assert_eq!(stored.document().display_name.as_deref(), Some("Standup"));

        // A local edit is pushed back as an iCalendar object
        store.touch("ev-1").unwrap();
        let outcome = run_session(
            &mut session,
            &journal,
            &Credential::new("token"),
            &mut store,
            codec_for(ServiceType::Calendar),
            &NoopDownloader,
        )
        .unwrap();
        assert_eq!(outcome.pushed, 1);
        let pushed = journal.entries.borrow()[1].clone();
        assert_eq!(pushed.action, Action::Change);
        assert!(pushed.content.contains("BEGIN:VEVENT\r\nUID:ev-1\r\n"));
        assert!(pushed.content.contains("DTSTART:20240101T090000Z\r\n"));
    }
}
