use async_trait::async_trait;
use cfgplane_controller::Watcher;
use cfgplane_controller::transaction::{ConfigurationWatcher, TransactionWatcher};
use cfgplane_store::{
    ConfigurationStore, MemoryConfigurationStore, MemoryTransactionStore, StoreError, StoreEvent,
    StoreResult, TransactionStore, WatchOptions,
};
use cfgplane_types::{Configuration, Index, Transaction, TransactionId, TransactionState};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn recv(rx: &mut mpsc::Receiver<TransactionId>) -> String {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no id delivered in time")
        .expect("channel closed")
        .to_string()
}

async fn assert_quiet(rx: &mut mpsc::Receiver<TransactionId>) {
    let extra = timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(extra.is_err(), "unexpected delivery: {extra:?}");
}

async fn set_state(store: &MemoryTransactionStore, id: &str, state: TransactionState) {
    let mut transaction = store.get(&id.into()).await.unwrap();
    transaction.status.state = state;
    store.update(transaction).await.unwrap();
}

async fn transaction_watch() -> (Arc<MemoryTransactionStore>, mpsc::Receiver<TransactionId>) {
    let store = Arc::new(MemoryTransactionStore::new());
    let (tx, rx) = mpsc::channel(16);
    TransactionWatcher::new(store.clone()).start(tx).await.unwrap();
    (store, rx)
}

// ── Transaction watcher ─────────────────────────────────────────

#[tokio::test]
async fn create_then_update_deliver_one_id_each() {
    let (store, mut rx) = transaction_watch().await;

    store.create(Transaction::change("change-1", vec![])).await.unwrap();
    assert_eq!(recv(&mut rx).await, "change-1");
    assert_quiet(&mut rx).await;

    set_state(&store, "change-1", TransactionState::Validating).await;
    assert_eq!(recv(&mut rx).await, "change-1");
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn existing_transactions_are_replayed_in_order() {
    let store = Arc::new(MemoryTransactionStore::new());
    for i in 1..=3 {
        store
            .create(Transaction::change(format!("change-{i}"), vec![]))
            .await
            .unwrap();
    }

    let (tx, mut rx) = mpsc::channel(16);
    TransactionWatcher::new(store.clone()).start(tx).await.unwrap();

    assert_eq!(recv(&mut rx).await, "change-1");
    assert_eq!(recv(&mut rx).await, "change-2");
    assert_eq!(recv(&mut rx).await, "change-3");
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn replay_larger_than_channel_does_not_stall() {
    let store = Arc::new(MemoryTransactionStore::new());
    for i in 1..=600 {
        store
            .create(Transaction::change(format!("change-{i}"), vec![]))
            .await
            .unwrap();
    }

    let (tx, mut rx) = mpsc::channel(4);
    let watcher = TransactionWatcher::new(store.clone());
    let drain = tokio::spawn(async move {
        let mut count = 0;
        while count < 600 {
            rx.recv().await.unwrap();
            count += 1;
        }
        count
    });
    timeout(Duration::from_secs(5), watcher.start(tx))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(drain.await.unwrap(), 600);
}

#[tokio::test]
async fn terminal_state_wakes_successor() {
    let (store, mut rx) = transaction_watch().await;
    store.create(Transaction::change("change-1", vec![])).await.unwrap();
    store.create(Transaction::change("change-2", vec![])).await.unwrap();
    recv(&mut rx).await;
    recv(&mut rx).await;

    set_state(&store, "change-1", TransactionState::Complete).await;

    assert_eq!(recv(&mut rx).await, "change-1");
    assert_eq!(recv(&mut rx).await, "change-2");
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn terminal_state_without_successor_delivers_only_itself() {
    let (store, mut rx) = transaction_watch().await;
    store.create(Transaction::change("change-1", vec![])).await.unwrap();
    recv(&mut rx).await;

    set_state(&store, "change-1", TransactionState::Failed).await;

    assert_eq!(recv(&mut rx).await, "change-1");
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn deletes_are_ignored() {
    let (store, mut rx) = transaction_watch().await;
    store.create(Transaction::change("change-1", vec![])).await.unwrap();
    recv(&mut rx).await;

    store.delete(&"change-1".into()).await.unwrap();
    assert_quiet(&mut rx).await;
}

/// Transaction store whose index lookups fail a fixed number of times.
struct FlakyTransactions {
    inner: Arc<MemoryTransactionStore>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl TransactionStore for FlakyTransactions {
    async fn get(&self, id: &TransactionId) -> StoreResult<Transaction> {
        self.inner.get(id).await
    }

    async fn get_by_index(&self, index: Index) -> StoreResult<Transaction> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Invalid("store unavailable".to_string()));
        }
        self.inner.get_by_index(index).await
    }

    async fn list(&self) -> StoreResult<Vec<Transaction>> {
        self.inner.list().await
    }

    async fn create(&self, transaction: Transaction) -> StoreResult<Transaction> {
        self.inner.create(transaction).await
    }

    async fn update(&self, transaction: Transaction) -> StoreResult<Transaction> {
        self.inner.update(transaction).await
    }

    async fn delete(&self, id: &TransactionId) -> StoreResult<Transaction> {
        self.inner.delete(id).await
    }

    async fn watch(
        &self,
        tx: mpsc::Sender<StoreEvent<Transaction>>,
        options: WatchOptions,
    ) -> StoreResult<()> {
        self.inner.watch(tx, options).await
    }
}

#[tokio::test]
async fn successor_wake_survives_lookup_errors() {
    let inner = Arc::new(MemoryTransactionStore::new());
    let store = Arc::new(FlakyTransactions {
        inner: inner.clone(),
        failures_left: AtomicUsize::new(3),
    });
    let (tx, mut rx) = mpsc::channel(16);
    TransactionWatcher::new(store).start(tx).await.unwrap();
    inner.create(Transaction::change("change-1", vec![])).await.unwrap();
    inner.create(Transaction::change("change-2", vec![])).await.unwrap();
    recv(&mut rx).await;
    recv(&mut rx).await;

    set_state(&inner, "change-1", TransactionState::Complete).await;

    assert_eq!(recv(&mut rx).await, "change-1");
    assert_eq!(recv(&mut rx).await, "change-2");
    assert_quiet(&mut rx).await;
}

// ── Configuration watcher ───────────────────────────────────────

#[tokio::test]
async fn configuration_maps_to_its_last_transaction() {
    let transactions = Arc::new(MemoryTransactionStore::new());
    let configurations = Arc::new(MemoryConfigurationStore::new());
    transactions.create(Transaction::change("change-1", vec![])).await.unwrap();
    transactions.create(Transaction::change("change-2", vec![])).await.unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    ConfigurationWatcher::new(configurations.clone(), transactions.clone())
        .start(tx)
        .await
        .unwrap();

    // Never written by a transaction: nothing to wake.
    let mut configuration = configurations
        .create(Configuration::new("device-1", "devicesim", "1.0.0"))
        .await
        .unwrap();
    assert_quiet(&mut rx).await;

    configuration.status.transaction_index = Index::new(2);
    configurations.update(configuration).await.unwrap();
    assert_eq!(recv(&mut rx).await, "change-2");
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn configuration_with_unknown_transaction_is_skipped() {
    let transactions = Arc::new(MemoryTransactionStore::new());
    let configurations = Arc::new(MemoryConfigurationStore::new());
    let mut configuration = Configuration::new("device-1", "devicesim", "1.0.0");
    configuration.status.transaction_index = Index::new(9);
    configurations.create(configuration).await.unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    ConfigurationWatcher::new(configurations.clone(), transactions.clone())
        .start(tx)
        .await
        .unwrap();

    assert_quiet(&mut rx).await;
}
