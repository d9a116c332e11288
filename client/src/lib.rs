//! jsync Client - network and storage adapters for jsync-engine.
//!
//! The engine defines contracts for every external collaborator. This crate
//! provides the implementations a host process needs:
//!
//! - [`HttpJournalClient`] talks to the journal service
//! - [`HttpResourceDownloader`] fetches external resources such as photos
//! - [`SqliteRegistry`] persists discovered collections
//! - [`SnapshotFile`] persists the local store of each collection

pub mod config;
pub mod db;
pub mod download;
pub mod error;
pub mod journal;
pub mod storage;

pub use config::{Config, ConfigError};
pub use db::SqliteRegistry;
pub use download::HttpResourceDownloader;
pub use error::{AppError, Result};
pub use journal::HttpJournalClient;
pub use storage::SnapshotFile;
