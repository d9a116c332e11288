//! Collection registry - the persisted set of known collections.
//!
//! Collections are scoped by service: one account plus one service type.
//! A scope's set is only ever replaced wholesale.

use crate::{error::Result, CollectionInfo, Error, ServiceType};
use std::collections::{BTreeMap, HashSet};

/// Identifier of an account + service type scope.
pub type ServiceId = i64;

/// Persisted mapping of account + service type to collections.
pub trait CollectionRegistry {
    /// Id of the scope, created on first use.
    fn service_id(&mut self, account: &str, service_type: ServiceType) -> Result<ServiceId>;

    /// Atomically replace every collection of a scope.
    ///
    /// Either the whole new set is stored or the previous set is left intact.
    fn replace_collections(&mut self, service: ServiceId, collections: &[CollectionInfo])
        -> Result<()>;

    /// Collections of a scope, ordered by url.
    fn list_collections(&self, service: ServiceId) -> Result<Vec<CollectionInfo>>;
}

/// Reject sets that would violate url uniqueness within a scope.
pub fn check_unique_urls(collections: &[CollectionInfo]) -> Result<()> {
    let mut seen = HashSet::new();
    for collection in collections {
        if collection.url.is_empty() {
            return Err(Error::Registry("collection without url".into()));
        }
        if !seen.insert(collection.url.as_str()) {
            return Err(Error::Registry(format!(
                "duplicate collection url: {}",
                collection.url
            )));
        }
    }
    Ok(())
}

/// In-memory registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    services: BTreeMap<(String, ServiceType), ServiceId>,
    collections: BTreeMap<ServiceId, Vec<CollectionInfo>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollectionRegistry for MemoryRegistry {
    fn service_id(&mut self, account: &str, service_type: ServiceType) -> Result<ServiceId> {
        let next = self.services.len() as ServiceId + 1;
        Ok(*self
            .services
            .entry((account.to_string(), service_type))
            .or_insert(next))
    }

    fn replace_collections(
        &mut self,
        service: ServiceId,
        collections: &[CollectionInfo],
    ) -> Result<()> {
        if !self.services.values().any(|id| *id == service) {
            return Err(Error::Registry(format!("unknown service #{}", service)));
        }
        check_unique_urls(collections)?;

        // Build the new set completely before swapping it in
        let mut replacement = collections.to_vec();
        replacement.sort_by(|a, b| a.url.cmp(&b.url));
        self.collections.insert(service, replacement);
        Ok(())
    }

    fn list_collections(&self, service: ServiceId) -> Result<Vec<CollectionInfo>> {
        Ok(self.collections.get(&service).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(url: &str) -> CollectionInfo {
        CollectionInfo::new(ServiceType::AddressBook, url.to_uppercase()).with_url(url)
    }

    #[test]
    fn service_ids_are_stable_per_scope() {
        let mut registry = MemoryRegistry::new();
        let a = registry.service_id("alice", ServiceType::AddressBook).unwrap();
        let b = registry.service_id("alice", ServiceType::Calendar).unwrap();
        let c = registry.service_id("bob", ServiceType::AddressBook).unwrap();

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.service_id("alice", ServiceType::AddressBook).unwrap(), a);
    }

    #[test]
    fn replace_is_wholesale() {
        let mut registry = MemoryRegistry::new();
        let service = registry.service_id("alice", ServiceType::AddressBook).unwrap();

        registry
            .replace_collections(service, &[collection("b"), collection("a")])
            .unwrap();
        registry
            .replace_collections(service, &[collection("c"), collection("b")])
            .unwrap();

        let urls: Vec<_> = registry
            .list_collections(service)
            .unwrap()
            .into_iter()
            .map(|c| c.url)
            .collect();
        assert_eq!(urls, vec!["b", "c"]);
    }

    #[test]
    fn failed_replace_keeps_previous_set() {
        let mut registry = MemoryRegistry::new();
        let service = registry.service_id("alice", ServiceType::AddressBook).unwrap();
        registry
            .replace_collections(service, &[collection("a")])
            .unwrap();

        let err = registry
            .replace_collections(service, &[collection("b"), collection("b")])
            .unwrap_err();
        assert!(matches!(err, Error::Registry(_)));
        assert_eq!(registry.list_collections(service).unwrap(), vec![collection("a")]);
    }

    #[test]
    fn scopes_are_isolated() {
        let mut registry = MemoryRegistry::new();
        let contacts = registry.service_id("alice", ServiceType::AddressBook).unwrap();
        let calendars = registry.service_id("alice", ServiceType::Calendar).unwrap();

        registry
            .replace_collections(contacts, &[collection("a")])
            .unwrap();
        assert!(registry.list_collections(calendars).unwrap().is_empty());
    }

    #[test]
    fn unknown_service_is_rejected() {
        let mut registry = MemoryRegistry::new();
        assert!(registry.replace_collections(42, &[]).is_err());
    }
}
