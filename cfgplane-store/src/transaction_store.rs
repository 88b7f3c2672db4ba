//! Transaction store.

use crate::error::StoreResult;
use crate::event::{StoreEvent, WatchOptions};
use crate::table::{Versioned, VersionedTable};
use async_trait::async_trait;
use cfgplane_types::{Index, Revision, Transaction, TransactionId};
use tokio::sync::mpsc;

/// Versioned store of transactions.
///
/// The store assigns each created transaction the next [`Index`]. Updates
/// are conditional on the caller's revision.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn get(&self, id: &TransactionId) -> StoreResult<Transaction>;

    async fn get_by_index(&self, index: Index) -> StoreResult<Transaction>;

    /// Returns every transaction in index order.
    async fn list(&self) -> StoreResult<Vec<Transaction>>;

    /// Stores a new transaction, assigning its index and first revision.
    async fn create(&self, transaction: Transaction) -> StoreResult<Transaction>;

    /// Writes `transaction` if its revision matches the stored one.
    async fn update(&self, transaction: Transaction) -> StoreResult<Transaction>;

    async fn delete(&self, id: &TransactionId) -> StoreResult<Transaction>;

    /// Subscribes `tx` to the change stream.
    async fn watch(
        &self,
        tx: mpsc::Sender<StoreEvent<Transaction>>,
        options: WatchOptions,
    ) -> StoreResult<()>;
}

impl Versioned for Transaction {
    type Key = TransactionId;

    const INDEXED: bool = true;

    fn key(&self) -> &TransactionId {
        &self.id
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }

    fn index(&self) -> Index {
        self.index
    }

    fn set_index(&mut self, index: Index) {
        self.index = index;
    }
}

/// In-memory [`TransactionStore`].
pub struct MemoryTransactionStore {
    table: VersionedTable<Transaction>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self {
            table: VersionedTable::new("transaction"),
        }
    }
}

impl Default for MemoryTransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn get(&self, id: &TransactionId) -> StoreResult<Transaction> {
        self.table.get(id).await
    }

    async fn get_by_index(&self, index: Index) -> StoreResult<Transaction> {
        self.table.get_by_index(index).await
    }

    async fn list(&self) -> StoreResult<Vec<Transaction>> {
        Ok(self.table.list().await)
    }

    async fn create(&self, transaction: Transaction) -> StoreResult<Transaction> {
        self.table.create(transaction).await
    }

    async fn update(&self, transaction: Transaction) -> StoreResult<Transaction> {
        self.table.update(transaction).await
    }

    async fn delete(&self, id: &TransactionId) -> StoreResult<Transaction> {
        self.table.delete(id).await
    }

    async fn watch(
        &self,
        tx: mpsc::Sender<StoreEvent<Transaction>>,
        options: WatchOptions,
    ) -> StoreResult<()> {
        self.table.watch(tx, options).await
    }
}
