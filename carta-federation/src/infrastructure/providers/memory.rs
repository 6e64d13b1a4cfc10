//! In-process source provider for tests and local wiring.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use crate::infrastructure::{FetchError, FetchResult, ResourcePayload, SourceProvider};

/// Source provider backed by an in-process map.
///
/// An optional artificial latency makes it usable for exercising the
/// fetch-claim race and timeout paths against a "slow" source.
#[derive(Default)]
pub struct InMemorySourceProvider {
    resources: RwLock<HashMap<String, ResourcePayload>>,
    latency: Option<Duration>,
}

impl InMemorySourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch by `latency` to simulate a slow remote source.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, locator: impl Into<String>, bytes: Vec<u8>, mime_type: impl Into<String>) {
        self.resources.write().unwrap().insert(
            locator.into(),
            ResourcePayload {
                bytes,
                mime_type: mime_type.into(),
            },
        );
    }

    pub fn remove(&self, locator: &str) {
        self.resources.write().unwrap().remove(locator);
    }
}

#[async_trait::async_trait]
impl SourceProvider for InMemorySourceProvider {
    async fn fetch(&self, locator: &str) -> FetchResult<ResourcePayload> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.resources
            .read()
            .unwrap()
            .get(locator)
            .cloned()
            .ok_or_else(|| FetchError::new(format!("resource not found: {locator}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_known_locator() {
        let provider = InMemorySourceProvider::new();
        provider.insert("doc-1", b"bytes".to_vec(), "text/plain");

        let payload = provider.fetch("doc-1").await.unwrap();
        assert_eq!(payload.bytes, b"bytes");
        assert_eq!(payload.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_fetch_unknown_locator() {
        let provider = InMemorySourceProvider::new();

        let err = provider.fetch("missing").await.unwrap_err();
        assert!(err.message.contains("resource not found"));
    }

    #[tokio::test]
    async fn test_remove_makes_locator_unfetchable() {
        let provider = InMemorySourceProvider::new();
        provider.insert("doc-1", b"bytes".to_vec(), "text/plain");
        provider.remove("doc-1");

        assert!(provider.fetch("doc-1").await.is_err());
    }
}
