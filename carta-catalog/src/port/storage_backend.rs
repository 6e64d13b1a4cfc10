//! Storage backend SPI - two-phase (stage/commit/rollback) content storage.
//!
//! Implementations stage create/update/delete changes into per-transaction
//! temporary state; only `commit` makes them durable and visible to `read`.
//! The physical layout (index shards, files) is the implementor's concern.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::content_item::{ContentItem, ItemId};
use crate::domain::operation::{ItemFault, QueryExpression};

/// Scope token for one staging transaction.
///
/// Passed back to `commit`/`rollback`; staged entries are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionToken(Uuid);

impl TransactionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageFault {
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("commit failed for transaction {txn}: {message}")]
    CommitFailed { txn: String, message: String },
    #[error("rollback failed for transaction {txn}: {message}")]
    RollbackFailed { txn: String, message: String },
    #[error("storage error: {0}")]
    Backend(String),
}

/// Per-item results of one staging call.
///
/// Staging failures fail only the affected item; `items` and `faults`
/// together cover the whole input batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub items: Vec<ContentItem>,
    pub faults: Vec<ItemFault>,
}

/// Transactional storage backend contract.
///
/// `create`/`update`/`delete` stage changes under the given transaction;
/// `read` and `query` consult persisted state only. Commit/rollback failures
/// are not partially recoverable - callers must retry from staging.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stage new items; ids are assigned here and immutable afterwards.
    async fn create(
        &self,
        txn: &TransactionToken,
        items: Vec<ContentItem>,
    ) -> Result<BatchOutcome, StorageFault>;

    /// Read a persisted item by its `scheme:id` URI.
    ///
    /// Staged-but-uncommitted ids report `NotFound`.
    async fn read(&self, uri: &str) -> Result<ContentItem, StorageFault>;

    /// Stage full-replace updates for already-persisted ids.
    async fn update(
        &self,
        txn: &TransactionToken,
        items: Vec<ContentItem>,
    ) -> Result<BatchOutcome, StorageFault>;

    /// Stage deletions. Ids staged by this transaction are unstaged directly;
    /// persisted ids get a tombstone applied at commit.
    async fn delete(
        &self,
        txn: &TransactionToken,
        ids: Vec<ItemId>,
    ) -> Result<BatchOutcome, StorageFault>;

    /// Evaluate a query expression against persisted state.
    async fn query(&self, expression: &QueryExpression) -> Result<Vec<ContentItem>, StorageFault>;

    /// Atomically move this transaction's staged entries into persisted state.
    async fn commit(&self, txn: &TransactionToken) -> Result<(), StorageFault>;

    /// Discard this transaction's staged entries without touching persisted state.
    async fn rollback(&self, txn: &TransactionToken) -> Result<(), StorageFault>;
}
