//! Deduplicating resource delivery over federated sources.
//!
//! Combines the source registry, the resource cache and a bounded worker
//! pool. Exactly one caller fetches a given cache key at a time; everyone
//! else is served from the cache, waits for the winner, or falls back to an
//! uncached direct fetch.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use crate::infrastructure::cache::{CacheKey, ResourceCacheManager};
use crate::infrastructure::config::FederationConfig;
use crate::infrastructure::registry::SourceRegistry;
use crate::infrastructure::{FetchError, ResourcePayload};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("unknown source: {0}")]
    UnknownSource(String),
    /// Remote fetch failed; the cache key was left retryable.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("fetch timed out")]
    Timeout,
}

/// A resource resolved for one caller.
#[derive(Debug, Clone)]
pub struct DeliveredResource {
    pub payload: ResourcePayload,
    pub from_cache: bool,
}

pub struct ResourceDeliveryService {
    registry: Arc<SourceRegistry>,
    cache: Arc<ResourceCacheManager>,
    fetch_permits: Arc<Semaphore>,
    fetch_timeout: Duration,
    wait_timeout: Duration,
}

impl ResourceDeliveryService {
    pub fn new(registry: Arc<SourceRegistry>, cache: Arc<ResourceCacheManager>) -> Self {
        Self::from_config(&FederationConfig::default(), registry, cache)
    }

    pub fn from_config(
        config: &FederationConfig,
        registry: Arc<SourceRegistry>,
        cache: Arc<ResourceCacheManager>,
    ) -> Self {
        Self {
            registry,
            cache,
            fetch_permits: Arc::new(Semaphore::new(config.delivery.max_concurrent_fetches.max(1))),
            fetch_timeout: Duration::from_secs(config.delivery.fetch_timeout_secs),
            wait_timeout: Duration::from_secs(config.delivery.wait_timeout_secs),
        }
    }

    /// The shared cache, e.g. for wiring external eviction signals.
    pub fn cache(&self) -> &Arc<ResourceCacheManager> {
        &self.cache
    }

    /// Resolve `locator` on `source_id` for the metacard identified by
    /// `metacard_id` / `modified`.
    ///
    /// Cache policy:
    /// - fresh valid entry: served from cache, no fetch
    /// - stale valid entry: evicted, then treated as absent
    /// - claim won: fetch, then `complete_fetch` / `fail_fetch`
    /// - claim lost: wait for the winner (bounded), re-check the cache, and
    ///   as a last resort fetch directly without caching
    pub async fn retrieve(
        &self,
        source_id: &str,
        metacard_id: &str,
        locator: &str,
        modified: Option<DateTime<Utc>>,
    ) -> Result<DeliveredResource, DeliveryError> {
        let key = CacheKey::new(source_id, metacard_id);

        if let Some(payload) = self.cache.valid_payload(&key, modified) {
            tracing::debug!(key = %key, "resource served from cache");
            return Ok(DeliveredResource {
                payload,
                from_cache: true,
            });
        }

        // a changed resource must not be served from an entry keyed by the
        // old identity
        self.cache.invalidate_stale(&key, modified);

        if self.cache.begin_fetch(&key) {
            match self.fetch_from_source(source_id, locator).await {
                Ok(payload) => {
                    self.cache.complete_fetch(&key, payload.clone(), modified);
                    Ok(DeliveredResource {
                        payload,
                        from_cache: false,
                    })
                }
                Err(e) => {
                    // the key must become retryable on every failure path,
                    // timeouts included
                    self.cache.fail_fetch(&key);
                    tracing::warn!(key = %key, error = %e, "fetch failed");
                    Err(e)
                }
            }
        } else {
            if self.cache.wait_for(&key, self.wait_timeout).await {
                if let Some(payload) = self.cache.valid_payload(&key, modified) {
                    tracing::debug!(key = %key, "resource served from cache after waiting");
                    return Ok(DeliveredResource {
                        payload,
                        from_cache: true,
                    });
                }
            }

            // winner failed, produced a different revision, or is still
            // running: fetch for this caller only, without touching the cache
            tracing::debug!(key = %key, "fetch claim busy; fetching uncached");
            let payload = self.fetch_from_source(source_id, locator).await?;
            Ok(DeliveredResource {
                payload,
                from_cache: false,
            })
        }
    }

    async fn fetch_from_source(
        &self,
        source_id: &str,
        locator: &str,
    ) -> Result<ResourcePayload, DeliveryError> {
        let provider = self
            .registry
            .resolve(source_id)
            .ok_or_else(|| DeliveryError::UnknownSource(source_id.to_string()))?;

        let _permit = self
            .fetch_permits
            .acquire()
            .await
            .map_err(|e| DeliveryError::Fetch(FetchError::new(e.to_string())))?;

        match tokio::time::timeout(self.fetch_timeout, provider.fetch(locator)).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(e)) => Err(DeliveryError::Fetch(e)),
            Err(_) => Err(DeliveryError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::providers::memory::InMemorySourceProvider;

    fn service_with(provider: InMemorySourceProvider) -> ResourceDeliveryService {
        let registry = Arc::new(SourceRegistry::new());
        registry.register("src1", provider);
        ResourceDeliveryService::new(registry, Arc::new(ResourceCacheManager::new()))
    }

    fn tuned_service(provider: InMemorySourceProvider, config: FederationConfig) -> ResourceDeliveryService {
        let registry = Arc::new(SourceRegistry::new());
        registry.register("src1", provider);
        ResourceDeliveryService::from_config(
            &config,
            registry,
            Arc::new(ResourceCacheManager::new()),
        )
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let provider = InMemorySourceProvider::new();
        provider.insert("doc", b"bytes".to_vec(), "text/plain");
        let service = service_with(provider);
        let modified = Some(Utc::now());

        let first = service
            .retrieve("src1", "meta42", "doc", modified)
            .await
            .unwrap();
        assert!(!first.from_cache);

        let second = service
            .retrieve("src1", "meta42", "doc", modified)
            .await
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(second.payload.bytes, b"bytes");
    }

    #[tokio::test]
    async fn test_unknown_source() {
        let service = service_with(InMemorySourceProvider::new());

        let err = service
            .retrieve("nowhere", "meta42", "doc", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::UnknownSource(_)));
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_key_retryable() {
        let provider = InMemorySourceProvider::new();
        let service = service_with(provider);

        let err = service
            .retrieve("src1", "meta42", "missing", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Fetch(_)));
        assert!(!service.cache().is_pending(&CacheKey::new("src1", "meta42")));

        // the same key is fetchable again: rebuild the registry around the
        // same cache, this time with the resource present
        let registry = Arc::new(SourceRegistry::new());
        let provider = InMemorySourceProvider::new();
        provider.insert("missing", b"late".to_vec(), "text/plain");
        registry.register("src1", provider);
        let service = ResourceDeliveryService::new(registry, service.cache().clone());

        let delivered = service
            .retrieve("src1", "meta42", "missing", None)
            .await
            .unwrap();
        assert_eq!(delivered.payload.bytes, b"late");
    }

    #[tokio::test]
    async fn test_timeout_invokes_fail_fetch() {
        let provider =
            InMemorySourceProvider::new().with_latency(Duration::from_millis(200));
        provider.insert("doc", b"slow".to_vec(), "text/plain");

        let config = FederationConfig {
            delivery: crate::infrastructure::config::DeliveryConfig {
                max_concurrent_fetches: 2,
                fetch_timeout_secs: 0,
                wait_timeout_secs: 1,
            },
            ..Default::default()
        };
        let service = tuned_service(provider, config);

        let err = service
            .retrieve("src1", "meta42", "doc", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Timeout));
        // fail_fetch ran: the key is claimable again
        assert!(service.cache().begin_fetch(&CacheKey::new("src1", "meta42")));
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched() {
        let provider = InMemorySourceProvider::new();
        provider.insert("doc", b"v1".to_vec(), "text/plain");
        let service = service_with(provider);

        let old = Some(Utc::now());
        service.retrieve("src1", "meta42", "doc", old).await.unwrap();

        // the resource changed upstream: new modified stamp must bypass the
        // cached entry
        let newer = Some(Utc::now());
        let delivered = service
            .retrieve("src1", "meta42", "doc", newer)
            .await
            .unwrap();
        assert!(!delivered.from_cache);

        // and the cache now serves the new revision
        let again = service
            .retrieve("src1", "meta42", "doc", newer)
            .await
            .unwrap();
        assert!(again.from_cache);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_retrievals_fetch_once() {
        let provider =
            InMemorySourceProvider::new().with_latency(Duration::from_millis(50));
        provider.insert("doc", b"bytes".to_vec(), "text/plain");

        let registry = Arc::new(SourceRegistry::new());
        registry.register("src1", provider);
        let cache = Arc::new(ResourceCacheManager::new());
        let service = Arc::new(ResourceDeliveryService::new(registry, cache));
        let modified = Some(Utc::now());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.retrieve("src1", "meta42", "doc", modified).await
            }));
        }

        let mut from_source = 0;
        for handle in handles {
            let delivered = handle.await.unwrap().unwrap();
            assert_eq!(delivered.payload.bytes, b"bytes");
            if !delivered.from_cache {
                from_source += 1;
            }
        }

        // exactly one caller wins the claim; the rest wait and get the
        // cached result
        assert_eq!(from_source, 1);
        assert!(service.cache().contains_valid(&CacheKey::new("src1", "meta42"), modified));
    }
}
