//! Error types for the jsync engine.

use crate::resource::ResourceKind;
use thiserror::Error;

/// All possible errors from the jsync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Remote errors
    #[error("http error: {0}")]
    Http(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    // Local errors
    #[error("local store error: {0}")]
    Store(String),

    #[error("collection registry error: {0}")]
    Registry(String),

    #[error("{operation} is not supported for {kind} resources")]
    Unsupported {
        kind: ResourceKind,
        operation: &'static str,
    },

    // Payload errors
    #[error("could not decode resource document: {0}")]
    Decode(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl Error {
    /// Whether the error must abort the current sync session.
    ///
    /// Only a document that fails to decode is recoverable: the entry
    /// carrying it is skipped and replay moves on.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Decode(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
