//! Resource cache - tracks in-flight and completed downloads per cache key.
//!
//! The state machine per key is `absent -> pending -> valid`, with
//! `fail_fetch` reverting pending to absent. `begin_fetch` is a
//! mutex-guarded check-and-set, which is what guarantees at most one
//! concurrent fetch per key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::infrastructure::ResourcePayload;

/// Deterministic identity of a cached resource.
///
/// Derived from (source id, metacard id): the same logical resource yields
/// the same key no matter which caller asks for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    source_id: String,
    metacard_id: String,
}

impl CacheKey {
    pub fn new(source_id: impl Into<String>, metacard_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            metacard_id: metacard_id.into(),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn metacard_id(&self) -> &str {
        &self.metacard_id
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source_id, self.metacard_id)
    }
}

enum CacheEntry {
    Pending {
        since: DateTime<Utc>,
        done: Arc<Notify>,
    },
    Valid {
        payload: ResourcePayload,
        /// Metacard `modified` snapshot taken when the fetch completed;
        /// drives the staleness comparison.
        modified: Option<DateTime<Utc>>,
        validated_at: DateTime<Utc>,
    },
}

/// Key-state map for resource downloads.
///
/// Pending entries are not servable results; they only mark that some
/// caller holds the fetch claim for the key.
#[derive(Default)]
pub struct ResourceCacheManager {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ResourceCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, key: &CacheKey) -> bool {
        matches!(
            self.entries.lock().unwrap().get(key),
            Some(CacheEntry::Pending { .. })
        )
    }

    /// Whether a fresh entry exists for `key`.
    ///
    /// Freshness compares the cached `modified` snapshot against the
    /// requesting metacard's; any mismatch is treated as absent even though
    /// an entry exists.
    pub fn contains_valid(&self, key: &CacheKey, requested_modified: Option<DateTime<Utc>>) -> bool {
        self.valid_payload(key, requested_modified).is_some()
    }

    /// Fresh cache hit, or `None` for absent / pending / stale entries.
    pub fn valid_payload(
        &self,
        key: &CacheKey,
        requested_modified: Option<DateTime<Utc>>,
    ) -> Option<ResourcePayload> {
        match self.entries.lock().unwrap().get(key) {
            Some(CacheEntry::Valid {
                payload, modified, ..
            }) if *modified == requested_modified => Some(payload.clone()),
            _ => None,
        }
    }

    /// Atomically claim the fetch for `key`.
    ///
    /// Returns true only on the absent -> pending transition; callers seeing
    /// false must not start their own caching fetch. Stale valid entries do
    /// not yield the claim either - evict them first via
    /// [`Self::invalidate_stale`].
    pub fn begin_fetch(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(_) => false,
            None => {
                entries.insert(
                    key.clone(),
                    CacheEntry::Pending {
                        since: Utc::now(),
                        done: Arc::new(Notify::new()),
                    },
                );
                tracing::debug!(key = %key, "fetch claim taken");
                true
            }
        }
    }

    /// pending -> valid; wakes waiters.
    pub fn complete_fetch(
        &self,
        key: &CacheKey,
        payload: ResourcePayload,
        modified: Option<DateTime<Utc>>,
    ) {
        let mut entries = self.entries.lock().unwrap();
        let previous = entries.insert(
            key.clone(),
            CacheEntry::Valid {
                payload,
                modified,
                validated_at: Utc::now(),
            },
        );

        match previous {
            Some(CacheEntry::Pending { done, since }) => {
                tracing::debug!(key = %key, pending_since = %since, "fetch completed");
                done.notify_waiters();
            }
            _ => {
                // completion without a live claim (e.g. invalidated mid-fetch):
                // the fresh result is still worth keeping
                tracing::warn!(key = %key, "fetch completed without a pending claim");
            }
        }
    }

    /// pending -> absent, making the key retryable; wakes waiters.
    pub fn fail_fetch(&self, key: &CacheKey) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(CacheEntry::Pending { done, .. }) = entries.remove(key) {
            tracing::debug!(key = %key, "fetch failed; key retryable");
            done.notify_waiters();
        }
    }

    /// External eviction signal: drop whatever is cached for `key`.
    ///
    /// A pending claim is dropped too, so waiters are woken and the key
    /// becomes claimable again.
    pub fn invalidate(&self, key: &CacheKey) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(CacheEntry::Pending { done, .. }) = entries.remove(key) {
            done.notify_waiters();
        }
    }

    /// Evict a valid entry whose snapshot does not match `requested_modified`.
    ///
    /// Returns true when a stale entry was dropped. Pending entries are left
    /// alone - the in-flight fetch will overwrite the snapshot anyway.
    pub fn invalidate_stale(
        &self,
        key: &CacheKey,
        requested_modified: Option<DateTime<Utc>>,
    ) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(CacheEntry::Valid { modified, .. }) if *modified != requested_modified => {
                entries.remove(key);
                tracing::debug!(key = %key, "stale cache entry evicted");
                true
            }
            _ => false,
        }
    }

    /// Wait until the pending fetch for `key` settles, or `timeout` elapses.
    ///
    /// Returns true when the key is no longer pending (the caller should
    /// re-check the cache; completion and failure both count as settled).
    pub async fn wait_for(&self, key: &CacheKey, timeout: Duration) -> bool {
        let done = {
            let entries = self.entries.lock().unwrap();
            match entries.get(key) {
                Some(CacheEntry::Pending { done, .. }) => done.clone(),
                // not pending: nothing to wait for
                _ => return true,
            }
        };

        let notified = done.notified();
        tokio::pin!(notified);
        // register before re-checking, so a completion racing with us
        // cannot slip between the check and the await
        notified.as_mut().enable();

        if !self.is_pending(key) {
            return true;
        }

        tokio::time::timeout(timeout, notified).await.is_ok()
    }
}
