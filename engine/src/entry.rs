//! Journal entries.
//!
//! A journal is an append-only log of entries. Each entry carries one
//! action and the serialized resource document it applies to.

use crate::EntryId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an entry does to the resource it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Add,
    Change,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Add => "ADD",
            Action::Change => "CHANGE",
            Action::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// One operation in a journal's stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    /// Position of this entry in its journal.
    #[serde(skip)]
    pub uid: EntryId,
    pub action: Action,
    /// Serialized resource document.
    pub content: String,
}

impl SyncEntry {
    /// Create a new entry.
    pub fn new(uid: impl Into<EntryId>, action: Action, content: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            action,
            content: content.into(),
        }
    }

    pub fn is_action(&self, action: Action) -> bool {
        self.action == action
    }

    /// Whether the entry creates or replaces a resource.
    pub fn is_upsert(&self) -> bool {
        matches!(self.action, Action::Add | Action::Change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_actions() {
        let entry = SyncEntry::new("e1", Action::Change, "BEGIN:VCARD\r\nEND:VCARD\r\n");
        assert!(entry.is_action(Action::Change));
        assert!(!entry.is_action(Action::Add));
        assert!(entry.is_upsert());
        assert!(!SyncEntry::new("e2", Action::Delete, "").is_upsert());
    }

    #[test]
    fn wire_shape() {
        let entry = SyncEntry::new("e1", Action::Add, "payload");
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"action":"ADD","content":"payload"}"#);

        let parsed: SyncEntry = serde_json::from_str(r#"{"action":"DELETE","content":"x"}"#).unwrap();
        assert_eq!(parsed.action, Action::Delete);
        assert!(parsed.uid.is_empty());
    }
}
