//! Collection metadata decoded from journal content.

use crate::{error::Result, Error, JournalId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of data a collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    AddressBook,
    Calendar,
    Tasks,
}

impl ServiceType {
    /// Stable name used on the wire and in the registry.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::AddressBook => "ADDRESS_BOOK",
            ServiceType::Calendar => "CALENDAR",
            ServiceType::Tasks => "TASKS",
        }
    }

    /// Parse the stable name back into a service type.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "ADDRESS_BOOK" => Some(ServiceType::AddressBook),
            "CALENDAR" => Some(ServiceType::Calendar),
            "TASKS" => Some(ServiceType::Tasks),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sync-able collection, one per journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    /// Journal identifier. Assigned from the journal itself, never read from content.
    #[serde(skip)]
    pub url: JournalId,
    /// Kind of data in this collection
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    /// Human readable name
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ARGB color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<i32>,
    #[serde(default)]
    pub read_only: bool,
    /// Whether the user enabled sync for this collection
    #[serde(default = "default_selected", skip_serializing)]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl CollectionInfo {
    /// Create collection info for a service type without a journal yet.
    pub fn new(service_type: ServiceType, display_name: impl Into<String>) -> Self {
        Self {
            url: JournalId::new(),
            service_type,
            display_name: display_name.into(),
            description: None,
            color: None,
            read_only: false,
            selected: true,
        }
    }

    /// The collection synthesized when an account has no journal of this type.
    pub fn default_for(service_type: ServiceType) -> Self {
        let name = match service_type {
            ServiceType::AddressBook => "My Contacts",
            ServiceType::Calendar => "My Calendar",
            ServiceType::Tasks => "My Tasks",
        };
        Self::new(service_type, name)
    }

    /// Builder-style url assignment.
    pub fn with_url(mut self, url: impl Into<JournalId>) -> Self {
        self.url = url.into();
        self
    }

    /// Decode decrypted journal content.
    pub fn from_json(content: &[u8]) -> Result<Self> {
        serde_json::from_slice(content)
            .map_err(|e| Error::Integrity(format!("malformed collection info: {}", e)))
    }

    /// Encode as journal content.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Integrity(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_for_service_type() {
        let info = CollectionInfo::default_for(ServiceType::Calendar);
        assert_eq!(info.service_type, ServiceType::Calendar);
        assert_eq!(info.display_name, "My Calendar");
        assert!(info.url.is_empty());
        assert!(!info.read_only);
    }

    #[test]
    fn url_is_not_part_of_content() {
        let info = CollectionInfo::default_for(ServiceType::AddressBook).with_url("journal-1");
        let json = String::from_utf8(info.to_json().unwrap()).unwrap();
        assert!(!json.contains("journal-1"));
        assert!(json.contains("\"type\":\"ADDRESS_BOOK\""));

        let parsed = CollectionInfo::from_json(json.as_bytes()).unwrap();
        assert!(parsed.url.is_empty());
        assert_eq!(parsed.display_name, "My Contacts");
    }

    #[test]
    fn malformed_content_is_an_integrity_error() {
        let err = CollectionInfo::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));

        let err = CollectionInfo::from_json(br#"{"type":"FAX","displayName":"x"}"#).unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }

    #[test]
    fn service_type_names() {
        assert_eq!(ServiceType::parse("address_book"), Some(ServiceType::AddressBook));
        assert_eq!(ServiceType::parse(" TASKS "), Some(ServiceType::Tasks));
        assert_eq!(ServiceType::parse("fax"), None);
        assert_eq!(ServiceType::Calendar.to_string(), "CALENDAR");
    }
}
