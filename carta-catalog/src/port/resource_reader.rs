//! Resource reader port - how the orchestrator obtains resource bytes.
//!
//! Implementations are expected to consult a local cache before going to a
//! remote source; the orchestrator itself stays cache-agnostic.

use async_trait::async_trait;

use crate::domain::metacard::Metacard;

/// A resource resolved on behalf of a `ResourceRequest`.
#[derive(Debug, Clone)]
pub struct RetrievedResource {
    pub payload: Vec<u8>,
    pub mime_type: String,
    /// True when served from the local cache rather than a remote fetch.
    pub from_cache: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceReadError {
    /// Remote fetch failed; the cache key is left retryable.
    #[error("resource fetch failed: {0}")]
    Fetch(String),
    #[error("unknown source: {0}")]
    UnknownSource(String),
    #[error("resource fetch timed out")]
    Timeout,
}

#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// Resolve the resource behind `uri` for the given metacard.
    ///
    /// `source_id` takes part in cache-key derivation; the metacard's
    /// `modified` timestamp drives staleness detection.
    async fn retrieve(
        &self,
        uri: &str,
        metacard: &Metacard,
        source_id: &str,
    ) -> Result<RetrievedResource, ResourceReadError>;
}
