//! # jsync Engine
//!
//! The client-side core of journal-based contact and calendar sync.
//!
//! A server keeps one append-only journal per collection. This crate
//! discovers which collections an account has and replays each journal's
//! entries against a local store, keeping identity stable across devices.
//!
//! ## Design Principles
//!
//! - **No IO**: network, database and platform access sit behind traits
//! - **Ordered**: entries are applied strictly in stream order
//! - **Sequential**: a session runs on the caller's thread, start to finish
//!
//! ## Core Concepts
//!
//! ### Collections
//!
//! A [`CollectionInfo`] describes one journal: its service type (address
//! book, calendar, tasks) and display metadata. [`discover`] refreshes the
//! [`CollectionRegistry`] from the server's listing, creating a default
//! collection when the account has none of a type.
//!
//! ### Entries
//!
//! A [`SyncEntry`] is one `ADD`, `CHANGE` or `DELETE` of a resource document:
//! a vCard for address books, an iCalendar object for calendars and task
//! lists ([`codec_for`] picks the matching [`DocumentCodec`]).
//! [`Replayer`] applies entries to a [`LocalResourceStore`]:
//! - matching resources are updated in place
//! - a uid that switched between group and contact is recreated
//! - group memberships are resolved after the whole batch
//!
//! ### Sessions
//!
//! [`run_session`] drives prepare, pull, push and post-processing for one
//! collection, returning the insert/update counters in [`SyncStats`].
//!
//! ## Quick Start
//!
//! ```rust
//! use jsync_engine::{
//!     Action, CollectionInfo, LocalResourceStore, MemoryStore, NoopDownloader, Replayer,
//!     ServiceType, SyncEntry, SyncSession, VCardCodec,
//! };
//!
//! let info = CollectionInfo::default_for(ServiceType::AddressBook).with_url("journal-1");
//! let mut session = SyncSession::new("alice", info);
//! let mut store = MemoryStore::new("journal-1");
//!
//! let entry = SyncEntry::new(
//!     "entry-1",
//!     Action::Add,
//!     "BEGIN:VCARD\r\nVERSION:3.0\r\nUID:c-1\r\nFN:Alice\r\nEND:VCARD\r\n",
//! );
//!
//! let mut replayer = Replayer::new(&mut store, &VCardCodec, &NoopDownloader);
//! replayer.replay(&mut session, &entry).unwrap();
//!
//! assert_eq!(session.stats.inserts, 1);
//! assert!(store.find_by_uid("c-1").unwrap().is_some());
//! ```
//!
//! ## Persistence
//!
//! Use [`MemoryStore::export_state`] and [`MemoryStore::import_state`] with
//! [`StoreSnapshot`] to persist a store between sessions.

pub mod collection;
pub mod discovery;
pub mod document;
pub mod download;
pub mod entry;
pub mod error;
pub mod ical;
pub mod journal;
pub mod registry;
pub mod replay;
pub mod resource;
pub mod session;
pub mod snapshot;
pub mod store;

// Re-export main types at crate root
pub use collection::{CollectionInfo, ServiceType};
pub use discovery::{discover, read_collections};
pub use document::{codec_for, Document, DocumentCodec, DocumentKind, Property, VCardCodec};
pub use download::{NoopDownloader, ResourceDownloader};
pub use entry::{Action, SyncEntry};
pub use error::Error;
pub use ical::{CalendarComponent, ICalCodec};
pub use journal::{Credential, JournalClient, JournalRef};
pub use registry::{check_unique_urls, CollectionRegistry, MemoryRegistry, ServiceId};
pub use replay::{apply_pending_memberships, PendingMembership, Replayer};
pub use resource::{LocalContact, LocalGroup, LocalResource, ResourceKind, SyncState};
pub use session::{
    post_process, prepare, pull, push_dirty, run_session, BoundJournal, SessionOutcome,
    SyncSession, SyncStats, SyncTrigger,
};
pub use snapshot::{StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{LocalResourceStore, MemoryStore};

/// Type aliases for clarity
pub type JournalId = String;
pub type EntryId = String;
pub type Uid = String;
