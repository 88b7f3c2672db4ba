//! Watchers feeding the transaction controller.

use crate::controller::Watcher;
use crate::error::ControllerResult;
use async_trait::async_trait;
use cfgplane_store::{
    ConfigurationStore, StoreEvent, StoreEventKind, TransactionStore, WatchOptions,
};
use cfgplane_types::{Configuration, Index, Transaction, TransactionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Buffer between a store subscription and its forwarding task.
const EVENT_BUFFER: usize = 256;

const LOOKUP_INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const LOOKUP_MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Forwards the id of every created or updated transaction.
///
/// When a transaction reaches a terminal state, the id of the transaction
/// at the next index is forwarded as well, so a successor waiting in
/// PENDING is woken as soon as its predecessor finishes.
pub struct TransactionWatcher {
    transactions: Arc<dyn TransactionStore>,
}

impl TransactionWatcher {
    pub fn new(transactions: Arc<dyn TransactionStore>) -> Self {
        Self { transactions }
    }
}

#[async_trait]
impl Watcher<TransactionId> for TransactionWatcher {
    async fn start(&self, tx: mpsc::Sender<TransactionId>) -> ControllerResult<()> {
        let (events_tx, mut events) = mpsc::channel::<StoreEvent<Transaction>>(EVENT_BUFFER);

        // Spawned before subscribing so the replay never waits on a full buffer.
        let transactions = Arc::clone(&self.transactions);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if event.kind == StoreEventKind::Deleted {
                    continue;
                }
                let transaction = event.object;
                if tx.send(transaction.id.clone()).await.is_err() {
                    break;
                }
                if transaction.is_terminal() {
                    if let Some(next) = lookup(&*transactions, transaction.index.next(), &tx).await {
                        debug!(id = %transaction.id, successor = %next, "Waking successor");
                        if tx.send(next).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Transaction watch closed");
        });

        self.transactions
            .watch(events_tx, WatchOptions::with_replay())
            .await?;
        Ok(())
    }
}

/// Forwards, for every created or updated configuration, the id of the
/// transaction that last wrote it.
pub struct ConfigurationWatcher {
    configurations: Arc<dyn ConfigurationStore>,
    transactions: Arc<dyn TransactionStore>,
}

impl ConfigurationWatcher {
    pub fn new(
        configurations: Arc<dyn ConfigurationStore>,
        transactions: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            configurations,
            transactions,
        }
    }
}

#[async_trait]
impl Watcher<TransactionId> for ConfigurationWatcher {
    async fn start(&self, tx: mpsc::Sender<TransactionId>) -> ControllerResult<()> {
        let (events_tx, mut events) = mpsc::channel::<StoreEvent<Configuration>>(EVENT_BUFFER);

        let transactions = Arc::clone(&self.transactions);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if event.kind == StoreEventKind::Deleted {
                    continue;
                }
                let index = event.object.status.transaction_index;
                if !index.is_assigned() {
                    continue;
                }
                if let Some(id) = lookup(&*transactions, index, &tx).await {
                    if tx.send(id).await.is_err() {
                        break;
                    }
                }
            }
            debug!("Configuration watch closed");
        });

        self.configurations
            .watch(events_tx, WatchOptions::with_replay())
            .await?;
        Ok(())
    }
}

/// Resolves the transaction at `index`. Store errors other than not-found
/// are retried with backoff until the lookup succeeds or the controller
/// hangs up, so a trigger is never dropped.
async fn lookup(
    transactions: &dyn TransactionStore,
    index: Index,
    tx: &mpsc::Sender<TransactionId>,
) -> Option<TransactionId> {
    let mut backoff = LOOKUP_INITIAL_BACKOFF;
    loop {
        match transactions.get_by_index(index).await {
            Ok(transaction) => return Some(transaction.id),
            Err(e) if e.is_not_found() => return None,
            Err(e) => {
                if tx.is_closed() {
                    return None;
                }
                warn!(
                    index = %index,
                    error = %e,
                    retry_in_ms = backoff.as_millis() as u64,
                    "Failed to look up transaction"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(LOOKUP_MAX_BACKOFF);
            }
        }
    }
}
