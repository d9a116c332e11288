//! HTTP client for the journal service.
//!
//! Endpoints, relative to the configured server URL:
//!
//! | Method | Path | Body |
//! |---|---|---|
//! | GET | `/api/v1/journals/` | - |
//! | POST | `/api/v1/journals/` | one [`JournalBlob`] |
//! | GET | `/api/v1/journals/{uid}/entries/?last={entry}` | - |
//! | POST | `/api/v1/journals/{uid}/entries/?last={entry}` | [`EntryBlob`] list |
//!
//! Journal and entry content travel base64 encoded.

use crate::error::http_error;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use jsync_engine::error::Result;
use jsync_engine::{Credential, Error, JournalClient, JournalRef, SyncEntry};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A journal as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalBlob {
    pub uid: String,
    pub content: String,
}

/// A journal entry as sent over the wire.
///
/// `content` is the base64 encoded JSON of the entry's action and document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryBlob {
    pub uid: String,
    pub content: String,
}

impl EntryBlob {
    pub fn encode(entry: &SyncEntry) -> Result<Self> {
        let json = serde_json::to_vec(entry).map_err(|e| Error::Integrity(e.to_string()))?;
        Ok(Self {
            uid: entry.uid.clone(),
            content: STANDARD.encode(json),
        })
    }

    pub fn decode(&self) -> Result<SyncEntry> {
        let json = STANDARD
            .decode(&self.content)
            .map_err(|e| Error::Integrity(format!("entry {}: {}", self.uid, e)))?;
        let mut entry: SyncEntry = serde_json::from_slice(&json)
            .map_err(|e| Error::Integrity(format!("entry {}: {}", self.uid, e)))?;
        entry.uid = self.uid.clone();
        Ok(entry)
    }
}

/// Blocking journal service client.
pub struct HttpJournalClient {
    client: Client,
    base_url: String,
}

impl HttpJournalClient {
    /// Create a new journal client.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(http_error)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn journals_url(&self) -> String {
        format!("{}/api/v1/journals/", self.base_url)
    }

    fn entries_url(&self, journal: &str) -> String {
        format!("{}/api/v1/journals/{}/entries/", self.base_url, journal)
    }

    fn send(&self, request: RequestBuilder, credential: &Credential) -> Result<Response> {
        let response = request
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", credential.token()),
            )
            .send()
            .map_err(http_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::InvalidAccount(format!("journal service refused credentials: {}", status)));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Http(format!("journal service error {}: {}", status, body)));
        }
        Ok(response)
    }
}

impl JournalClient for HttpJournalClient {
    fn list_journals(&self, credential: &Credential) -> Result<Vec<JournalRef>> {
        let response = self.send(self.client.get(self.journals_url()), credential)?;
        let blobs: Vec<JournalBlob> = response
            .json()
            .map_err(|e| Error::Integrity(format!("invalid journal listing: {}", e)))?;

        blobs
            .into_iter()
            .map(|blob| {
                let content = STANDARD
                    .decode(&blob.content)
                    .map_err(|e| Error::Integrity(format!("journal {}: {}", blob.uid, e)))?;
                Ok(JournalRef::new(blob.uid, content))
            })
            .collect()
    }

    fn put_journal(&self, credential: &Credential, journal: JournalRef) -> Result<()> {
        let blob = JournalBlob {
            content: STANDARD.encode(&journal.content),
            uid: journal.uid,
        };
        self.send(self.client.post(self.journals_url()).json(&blob), credential)?;
        tracing::info!(journal = %blob.uid, "created journal");
        Ok(())
    }

    fn fetch_entries(
        &self,
        credential: &Credential,
        journal: &str,
        since: Option<&str>,
    ) -> Result<Vec<SyncEntry>> {
        let mut request = self.client.get(self.entries_url(journal));
        if let Some(last) = since {
            request = request.query(&[("last", last)]);
        }

        let response = self.send(request, credential)?;
        let blobs: Vec<EntryBlob> = response
            .json()
            .map_err(|e| Error::Integrity(format!("invalid entry listing: {}", e)))?;
        blobs.iter().map(EntryBlob::decode).collect()
    }

    fn put_entries(
        &self,
        credential: &Credential,
        journal: &str,
        last: Option<&str>,
        entries: &[SyncEntry],
    ) -> Result<()> {
        let blobs = entries
            .iter()
            .map(EntryBlob::encode)
            .collect::<Result<Vec<_>>>()?;

        let mut request = self.client.post(self.entries_url(journal));
        if let Some(last) = last {
            request = request.query(&[("last", last)]);
        }
        self.send(request.json(&blobs), credential)?;
        Ok(())
    }
}
