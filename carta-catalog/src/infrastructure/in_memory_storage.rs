//! In-memory reference implementation of the transactional storage backend.
//!
//! Staged and persisted state live behind a single mutex so that commit is
//! atomic from any reader's perspective. Staged entries are keyed by
//! transaction, so concurrent transactions with disjoint id sets interleave
//! safely.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::content_item::{ContentItem, ItemId};
use crate::domain::operation::{ItemFault, QueryExpression};
use crate::port::storage_backend::{BatchOutcome, StorageBackend, StorageFault, TransactionToken};

const URI_SCHEME: &str = "carta";

/// One staged change. Tombstones mark persisted ids for removal at commit.
enum StagedEntry {
    Upsert(ContentItem),
    Tombstone,
}

#[derive(Default)]
struct StorageState {
    /// Transaction -> item id -> staged change.
    temporary: HashMap<TransactionToken, HashMap<String, StagedEntry>>,
    /// Item id -> committed item.
    persisted: HashMap<String, ContentItem>,
}

/// Reference `StorageBackend` over locked in-process maps.
///
/// The lock is never held across an await point; all operations complete
/// under one acquisition.
#[derive(Default)]
pub struct InMemoryStorageBackend {
    state: Mutex<StorageState>,
}

impl InMemoryStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StorageState>, StorageFault> {
        self.state
            .lock()
            .map_err(|e| StorageFault::Backend(e.to_string()))
    }

    fn item_uri(id: &str) -> String {
        format!("{URI_SCHEME}:{id}")
    }

    fn parse_uri(uri: &str) -> Result<&str, StorageFault> {
        uri.strip_prefix(URI_SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StorageFault::Backend(format!("invalid item uri: {uri}")))
    }

    fn validate_new(item: &ContentItem, index: usize) -> Option<ItemFault> {
        if item.id().is_some() {
            return Some(ItemFault {
                index,
                id: item.id().cloned(),
                reason: "id must be unset before create".to_string(),
            });
        }
        if item.payload().is_empty() {
            return Some(ItemFault {
                index,
                id: None,
                reason: "empty payload".to_string(),
            });
        }
        if item.mime_type().is_empty() {
            return Some(ItemFault {
                index,
                id: None,
                reason: "missing mime type".to_string(),
            });
        }
        None
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorageBackend {
    async fn create(
        &self,
        txn: &TransactionToken,
        items: Vec<ContentItem>,
    ) -> Result<BatchOutcome, StorageFault> {
        let mut outcome = BatchOutcome::default();
        let mut state = self.lock()?;
        let staged = state.temporary.entry(txn.clone()).or_default();

        for (index, item) in items.into_iter().enumerate() {
            if let Some(fault) = Self::validate_new(&item, index) {
                outcome.faults.push(fault);
                continue;
            }

            let id = Uuid::new_v4().to_string();
            let metacard = item.metacard().with_id(id.as_str());
            let staged_item = item
                .with_metacard(metacard)
                .staged(ItemId::new(id.clone()), Self::item_uri(&id));

            staged.insert(id, StagedEntry::Upsert(staged_item.clone()));
            outcome.items.push(staged_item);
        }

        tracing::debug!(
            txn = %txn,
            staged = outcome.items.len(),
            faults = outcome.faults.len(),
            "staged create batch"
        );
        Ok(outcome)
    }

    async fn read(&self, uri: &str) -> Result<ContentItem, StorageFault> {
        let id = Self::parse_uri(uri)?;
        let state = self.lock()?;

        // Only persisted state is readable; staged entries stay invisible.
        state
            .persisted
            .get(id)
            .cloned()
            .ok_or_else(|| StorageFault::NotFound(uri.to_string()))
    }

    async fn update(
        &self,
        txn: &TransactionToken,
        items: Vec<ContentItem>,
    ) -> Result<BatchOutcome, StorageFault> {
        let mut outcome = BatchOutcome::default();
        let mut state = self.lock()?;
        let StorageState {
            temporary,
            persisted,
        } = &mut *state;
        let staged = temporary.entry(txn.clone()).or_default();

        for (index, item) in items.into_iter().enumerate() {
            let Some(id) = item.id().cloned() else {
                outcome.faults.push(ItemFault {
                    index,
                    id: None,
                    reason: "update requires an assigned id".to_string(),
                });
                continue;
            };
            if item.payload().is_empty() {
                outcome.faults.push(ItemFault {
                    index,
                    id: Some(id),
                    reason: "empty payload".to_string(),
                });
                continue;
            }

            let known = persisted.contains_key(id.as_str())
                || matches!(staged.get(id.as_str()), Some(StagedEntry::Upsert(_)));
            if !known {
                outcome.faults.push(ItemFault {
                    index,
                    id: Some(id.clone()),
                    reason: format!("unknown item: {id}"),
                });
                continue;
            }

            // Full replace under the same id; modified is bumped here so
            // cache staleness checks see every update.
            let metacard = item.metacard().touch();
            let staged_item = item
                .with_metacard(metacard)
                .staged(id.clone(), Self::item_uri(id.as_str()));

            staged.insert(id.into_inner(), StagedEntry::Upsert(staged_item.clone()));
            outcome.items.push(staged_item);
        }

        tracing::debug!(
            txn = %txn,
            staged = outcome.items.len(),
            faults = outcome.faults.len(),
            "staged update batch"
        );
        Ok(outcome)
    }

    async fn delete(
        &self,
        txn: &TransactionToken,
        ids: Vec<ItemId>,
    ) -> Result<BatchOutcome, StorageFault> {
        let mut outcome = BatchOutcome::default();
        let mut state = self.lock()?;
        let StorageState {
            temporary,
            persisted,
        } = &mut *state;
        let staged = temporary.entry(txn.clone()).or_default();

        for (index, id) in ids.into_iter().enumerate() {
            match staged.remove(id.as_str()) {
                // Delete-before-commit: unstage the pending upsert directly.
                Some(StagedEntry::Upsert(item)) => {
                    outcome.items.push(item);
                    continue;
                }
                // Already tombstoned by this transaction; keep it staged.
                Some(StagedEntry::Tombstone) => {
                    staged.insert(id.into_inner(), StagedEntry::Tombstone);
                    continue;
                }
                None => {}
            }

            match persisted.get(id.as_str()) {
                Some(item) => {
                    outcome.items.push(item.clone());
                    staged.insert(id.into_inner(), StagedEntry::Tombstone);
                }
                None => outcome.faults.push(ItemFault {
                    index,
                    id: Some(id.clone()),
                    reason: format!("unknown item: {id}"),
                }),
            }
        }

        tracing::debug!(
            txn = %txn,
            staged = outcome.items.len(),
            faults = outcome.faults.len(),
            "staged delete batch"
        );
        Ok(outcome)
    }

    async fn query(&self, expression: &QueryExpression) -> Result<Vec<ContentItem>, StorageFault> {
        let state = self.lock()?;

        let hits = match expression {
            QueryExpression::ById(id) => {
                state.persisted.get(id.as_str()).cloned().into_iter().collect()
            }
            QueryExpression::AttributeEquals { name, value } => state
                .persisted
                .values()
                .filter(|item| {
                    item.metacard()
                        .attribute(name)
                        .is_some_and(|values| values.contains(value))
                })
                .cloned()
                .collect(),
        };

        Ok(hits)
    }

    async fn commit(&self, txn: &TransactionToken) -> Result<(), StorageFault> {
        let mut state = self.lock()?;

        // Nothing staged is a valid (empty) commit.
        let Some(staged) = state.temporary.remove(txn) else {
            return Ok(());
        };

        let count = staged.len();
        for (id, entry) in staged {
            match entry {
                StagedEntry::Upsert(item) => {
                    state.persisted.insert(id, item);
                }
                StagedEntry::Tombstone => {
                    state.persisted.remove(&id);
                }
            }
        }

        tracing::info!(txn = %txn, entries = count, "committed transaction");
        Ok(())
    }

    async fn rollback(&self, txn: &TransactionToken) -> Result<(), StorageFault> {
        let mut state = self.lock()?;
        let dropped = state
            .temporary
            .remove(txn)
            .map(|staged| staged.len())
            .unwrap_or(0);

        tracing::info!(txn = %txn, entries = dropped, "rolled back transaction");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metacard::{AttributeValue, Metacard};

    fn new_item(payload: &[u8]) -> ContentItem {
        ContentItem::new(
            payload.to_vec(),
            "application/octet-stream",
            Metacard::new("meta", "src-1"),
        )
    }

    async fn create_one(backend: &InMemoryStorageBackend, txn: &TransactionToken) -> ContentItem {
        let outcome = backend
            .create(txn, vec![new_item(b"payload")])
            .await
            .unwrap();
        assert!(outcome.faults.is_empty());
        outcome.items.into_iter().next().unwrap()
    }

    #[tokio::test]
    async fn staged_item_gets_id_uri_and_size() {
        let backend = InMemoryStorageBackend::new();
        let txn = TransactionToken::new();

        let staged = create_one(&backend, &txn).await;

        let id = staged.id().unwrap().as_str().to_string();
        assert_eq!(staged.uri(), Some(format!("carta:{id}").as_str()));
        assert_eq!(staged.size(), Some(7));
        // metacard id is aligned with the item id once staged
        assert_eq!(staged.metacard().id(), id);
    }

    #[tokio::test]
    async fn staged_item_is_invisible_until_commit() {
        let backend = InMemoryStorageBackend::new();
        let txn = TransactionToken::new();

        let staged = create_one(&backend, &txn).await;
        let uri = staged.uri().unwrap().to_string();

        let err = backend.read(&uri).await.unwrap_err();
        assert!(matches!(err, StorageFault::NotFound(_)));

        backend.commit(&txn).await.unwrap();

        let read = backend.read(&uri).await.unwrap();
        assert_eq!(read.payload(), staged.payload());
    }

    #[tokio::test]
    async fn rollback_discards_staged_entries() {
        let backend = InMemoryStorageBackend::new();
        let txn = TransactionToken::new();

        let staged = create_one(&backend, &txn).await;
        let uri = staged.uri().unwrap().to_string();

        backend.rollback(&txn).await.unwrap();
        backend.commit(&txn).await.unwrap();

        let err = backend.read(&uri).await.unwrap_err();
        assert!(matches!(err, StorageFault::NotFound(_)));
    }

    #[tokio::test]
    async fn create_reports_per_item_faults_alongside_successes() {
        let backend = InMemoryStorageBackend::new();
        let txn = TransactionToken::new();

        let outcome = backend
            .create(
                &txn,
                vec![new_item(b"a"), new_item(b""), new_item(b"c")],
            )
            .await
            .unwrap();

        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.faults.len(), 1);
        assert_eq!(outcome.faults[0].index, 1);
        assert_eq!(outcome.faults[0].reason, "empty payload");
    }

    #[tokio::test]
    async fn update_batch_stages_good_items_and_faults_bad_ones() {
        let backend = InMemoryStorageBackend::new();
        let setup = TransactionToken::new();

        let a = create_one(&backend, &setup).await;
        let c = create_one(&backend, &setup).await;
        backend.commit(&setup).await.unwrap();

        let txn = TransactionToken::new();
        let updated_a = a.clone().with_payload(b"a2".to_vec());
        let broken_b = ContentItem::new(
            b"b2".to_vec(),
            "application/octet-stream",
            Metacard::new("meta-b", "src-1"),
        ); // missing id
        let updated_c = c.clone().with_payload(b"c2".to_vec());

        let outcome = backend
            .update(&txn, vec![updated_a, broken_b, updated_c])
            .await
            .unwrap();

        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.faults.len(), 1);
        assert_eq!(outcome.faults[0].index, 1);

        // no automatic commit: persisted payloads are unchanged
        let read = backend.read(a.uri().unwrap()).await.unwrap();
        assert_eq!(read.payload(), b"payload");
    }

    #[tokio::test]
    async fn update_bumps_metacard_modified() {
        let backend = InMemoryStorageBackend::new();
        let setup = TransactionToken::new();
        let item = create_one(&backend, &setup).await;
        backend.commit(&setup).await.unwrap();

        let before = item.metacard().modified();
        let txn = TransactionToken::new();
        let outcome = backend
            .update(&txn, vec![item.with_payload(b"next".to_vec())])
            .await
            .unwrap();

        assert!(outcome.items[0].metacard().modified() >= before);
    }

    #[tokio::test]
    async fn delete_before_commit_unstages_the_item() {
        let backend = InMemoryStorageBackend::new();
        let txn = TransactionToken::new();

        let staged = create_one(&backend, &txn).await;
        let id = staged.id().unwrap().clone();
        let uri = staged.uri().unwrap().to_string();

        let outcome = backend.delete(&txn, vec![id]).await.unwrap();
        assert_eq!(outcome.items.len(), 1);

        backend.commit(&txn).await.unwrap();
        assert!(matches!(
            backend.read(&uri).await,
            Err(StorageFault::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_of_persisted_item_takes_effect_at_commit() {
        let backend = InMemoryStorageBackend::new();
        let setup = TransactionToken::new();
        let item = create_one(&backend, &setup).await;
        backend.commit(&setup).await.unwrap();
        let uri = item.uri().unwrap().to_string();

        let txn = TransactionToken::new();
        backend
            .delete(&txn, vec![item.id().unwrap().clone()])
            .await
            .unwrap();

        // still visible before commit
        assert!(backend.read(&uri).await.is_ok());

        backend.commit(&txn).await.unwrap();
        assert!(matches!(
            backend.read(&uri).await,
            Err(StorageFault::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_a_per_item_fault() {
        let backend = InMemoryStorageBackend::new();
        let txn = TransactionToken::new();

        let outcome = backend
            .delete(&txn, vec![ItemId::new("missing".into())])
            .await
            .unwrap();

        assert!(outcome.items.is_empty());
        assert_eq!(outcome.faults.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_transactions_stay_isolated() {
        let backend = InMemoryStorageBackend::new();
        let txn_a = TransactionToken::new();
        let txn_b = TransactionToken::new();

        let a = create_one(&backend, &txn_a).await;
        let b = create_one(&backend, &txn_b).await;

        backend.rollback(&txn_a).await.unwrap();
        backend.commit(&txn_b).await.unwrap();

        assert!(matches!(
            backend.read(a.uri().unwrap()).await,
            Err(StorageFault::NotFound(_))
        ));
        assert!(backend.read(b.uri().unwrap()).await.is_ok());
    }

    #[tokio::test]
    async fn query_by_attribute_matches_persisted_only() {
        let backend = InMemoryStorageBackend::new();
        let txn = TransactionToken::new();

        let tagged = ContentItem::new(
            b"tagged".to_vec(),
            "text/plain",
            Metacard::new("meta", "src-1")
                .with_attribute("topic", AttributeValue::Text("maps".into())),
        );
        backend.create(&txn, vec![tagged]).await.unwrap();

        let expr = QueryExpression::AttributeEquals {
            name: "topic".to_string(),
            value: AttributeValue::Text("maps".into()),
        };

        // staged only: no hits yet
        assert!(backend.query(&expr).await.unwrap().is_empty());

        backend.commit(&txn).await.unwrap();
        assert_eq!(backend.query(&expr).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn read_rejects_foreign_uri_scheme() {
        let backend = InMemoryStorageBackend::new();

        let err = backend.read("file:whatever").await.unwrap_err();
        assert!(matches!(err, StorageFault::Backend(_)));
    }
}
