//! Fetching of external binary content referenced by documents.

/// Fetches binary payloads (photos, attachments) referenced by URL.
///
/// Failures are never surfaced: a missing payload degrades to `None`.
pub trait ResourceDownloader {
    fn download(&self, url: &str, accept: &str) -> Option<Vec<u8>>;
}

/// Downloader that never fetches anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDownloader;

impl ResourceDownloader for NoopDownloader {
    fn download(&self, url: &str, _accept: &str) -> Option<Vec<u8>> {
        tracing::debug!(url, "external resources disabled, not downloading");
        None
    }
}

impl<D: ResourceDownloader + ?Sized> ResourceDownloader for &D {
    fn download(&self, url: &str, accept: &str) -> Option<Vec<u8>> {
        (**self).download(url, accept)
    }
}
