//! Collection discovery.
//!
//! Reconciles the server's journal listing with the collection registry for
//! one account and service type.
//!
//! # Algorithm
//!
//! 1. List every journal visible to the account
//! 2. Decode each journal's content, keep those of the wanted service type
//! 3. If none remain, create a journal holding a default collection
//! 4. Replace the registry's set for the scope with the result

use crate::{
    error::Result, journal::new_uid, CollectionInfo, CollectionRegistry, Credential,
    JournalClient, JournalId, JournalRef, ServiceType,
};
use std::collections::BTreeMap;

/// Discover the collections of `service_type` and persist them.
///
/// Returns the set now stored in the registry. Journal content that fails
/// to decode aborts discovery before the registry is touched.
pub fn discover<J, R>(
    journals: &J,
    registry: &mut R,
    account: &str,
    credential: &Credential,
    service_type: ServiceType,
) -> Result<Vec<CollectionInfo>>
where
    J: JournalClient + ?Sized,
    R: CollectionRegistry + ?Sized,
{
    tracing::info!(account, %service_type, "refreshing collections");

    let mut collections = Vec::new();
    for journal in journals.list_journals(credential)? {
        let info = CollectionInfo::from_json(&journal.content)?.with_url(journal.uid);
        if info.service_type == service_type {
            collections.push(info);
        }
    }

    if collections.is_empty() {
        let info = CollectionInfo::default_for(service_type).with_url(new_uid());
        tracing::info!(url = %info.url, %service_type, "no collection on server, creating default");
        journals.put_journal(credential, JournalRef::new(info.url.clone(), info.to_json()?))?;
        collections.push(info);
    }

    let service = registry.service_id(account, service_type)?;
    let previous = read_collections(registry, service)?;
    for url in previous.keys() {
        if !collections.iter().any(|c| &c.url == url) {
            // Local resources of a collection removed on the server are left in place
            tracing::warn!(%url, "collection no longer on server, local data not removed");
        }
    }

    for collection in &collections {
        tracing::debug!(url = %collection.url, name = %collection.display_name, "saving collection");
    }
    registry.replace_collections(service, &collections)?;

    registry.list_collections(service)
}

/// Current collections of a registry scope, keyed by url.
pub fn read_collections<R>(
    registry: &R,
    service: crate::ServiceId,
) -> Result<BTreeMap<JournalId, CollectionInfo>>
where
    R: CollectionRegistry + ?Sized,
{
    Ok(registry
        .list_collections(service)?
        .into_iter()
        .map(|c| (c.url.clone(), c))
        .collect())
}
