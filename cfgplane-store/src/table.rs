//! Generic in-memory versioned table shared by the memory stores.
//!
//! Writes are serialized through the subscriber lock, which is held while
//! the resulting event is delivered. That gives every subscriber the same
//! commit order and lets a slow subscriber apply backpressure to writers.
//! Reads only take the object lock and are never blocked by delivery.

use crate::error::{StoreError, StoreResult};
use crate::event::{StoreEvent, StoreEventKind, WatchOptions};
use cfgplane_types::{Index, Revision};
use std::collections::BTreeMap;
use std::fmt::Display;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, trace};

/// An object that can live in a [`VersionedTable`].
pub(crate) trait Versioned: Clone + Send + Sync + 'static {
    type Key: Clone + Ord + Display + Send + Sync + 'static;

    /// Whether the table assigns a global index on create.
    const INDEXED: bool = false;

    fn key(&self) -> &Self::Key;
    fn revision(&self) -> Revision;
    fn set_revision(&mut self, revision: Revision);

    fn index(&self) -> Index {
        Index::NONE
    }

    fn set_index(&mut self, _index: Index) {}
}

struct State<T: Versioned> {
    objects: BTreeMap<T::Key, T>,
    by_index: BTreeMap<Index, T::Key>,
    last_index: Index,
}

pub(crate) struct VersionedTable<T: Versioned> {
    kind: &'static str,
    state: RwLock<State<T>>,
    subscribers: Mutex<Vec<mpsc::Sender<StoreEvent<T>>>>,
}

impl<T: Versioned> VersionedTable<T> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            state: RwLock::new(State {
                objects: BTreeMap::new(),
                by_index: BTreeMap::new(),
                last_index: Index::NONE,
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn not_found(&self, what: impl Display) -> StoreError {
        StoreError::NotFound(format!("{} {what}", self.kind))
    }

    pub(crate) async fn get(&self, key: &T::Key) -> StoreResult<T> {
        self.state
            .read()
            .await
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| self.not_found(key))
    }

    pub(crate) async fn get_by_index(&self, index: Index) -> StoreResult<T> {
        let state = self.state.read().await;
        state
            .by_index
            .get(&index)
            .and_then(|key| state.objects.get(key))
            .cloned()
            .ok_or_else(|| self.not_found(format_args!("at index {index}")))
    }

    /// All objects, in index order for indexed tables and key order otherwise.
    pub(crate) async fn list(&self) -> Vec<T> {
        let state = self.state.read().await;
        if T::INDEXED {
            state
                .by_index
                .values()
                .filter_map(|key| state.objects.get(key))
                .cloned()
                .collect()
        } else {
            state.objects.values().cloned().collect()
        }
    }

    pub(crate) async fn create(&self, mut object: T) -> StoreResult<T> {
        let mut subscribers = self.subscribers.lock().await;
        {
            let mut state = self.state.write().await;
            if state.objects.contains_key(object.key()) {
                return Err(StoreError::AlreadyExists(format!(
                    "{} {}",
                    self.kind,
                    object.key()
                )));
            }
            if T::INDEXED {
                let index = state.last_index.next();
                state.last_index = index;
                object.set_index(index);
                state.by_index.insert(index, object.key().clone());
            }
            object.set_revision(Revision::new(1));
            state.objects.insert(object.key().clone(), object.clone());
        }
        debug!(kind = self.kind, key = %object.key(), index = %object.index(), "Created object");

        publish(&mut subscribers, StoreEventKind::Created, &object).await;
        Ok(object)
    }

    pub(crate) async fn update(&self, mut object: T) -> StoreResult<T> {
        let mut subscribers = self.subscribers.lock().await;
        {
            let mut state = self.state.write().await;
            let stored = state
                .objects
                .get(object.key())
                .ok_or_else(|| self.not_found(object.key()))?;
            if stored.revision() != object.revision() {
                return Err(StoreError::Conflict {
                    id: object.key().to_string(),
                    expected: object.revision(),
                    actual: stored.revision(),
                });
            }
            if stored.index() != object.index() {
                return Err(StoreError::Invalid(format!(
                    "index of {} {} is immutable",
                    self.kind,
                    object.key()
                )));
            }
            object.set_revision(stored.revision().next());
            state.objects.insert(object.key().clone(), object.clone());
        }
        trace!(kind = self.kind, key = %object.key(), revision = %object.revision(), "Updated object");

        publish(&mut subscribers, StoreEventKind::Updated, &object).await;
        Ok(object)
    }

    pub(crate) async fn delete(&self, key: &T::Key) -> StoreResult<T> {
        let mut subscribers = self.subscribers.lock().await;
        let removed = {
            let mut state = self.state.write().await;
            let removed = state
                .objects
                .remove(key)
                .ok_or_else(|| self.not_found(key))?;
            if T::INDEXED {
                state.by_index.remove(&removed.index());
            }
            removed
        };
        debug!(kind = self.kind, key = %key, "Deleted object");

        publish(&mut subscribers, StoreEventKind::Deleted, &removed).await;
        Ok(removed)
    }

    pub(crate) async fn watch(
        &self,
        tx: mpsc::Sender<StoreEvent<T>>,
        options: WatchOptions,
    ) -> StoreResult<()> {
        // Holding the subscriber lock keeps writes out until the replay is
        // queued, so no event falls between replay and live delivery.
        let mut subscribers = self.subscribers.lock().await;
        if options.replay {
            for object in self.list().await {
                if tx
                    .send(StoreEvent::new(StoreEventKind::Replayed, object))
                    .await
                    .is_err()
                {
                    return Ok(());
                }
            }
        }
        subscribers.push(tx);
        debug!(kind = self.kind, subscribers = subscribers.len(), "Watch opened");
        Ok(())
    }
}

async fn publish<T: Versioned>(
    subscribers: &mut Vec<mpsc::Sender<StoreEvent<T>>>,
    kind: StoreEventKind,
    object: &T,
) {
    for tx in subscribers.iter() {
        // A failed send means the receiver is gone; pruned below.
        let _ = tx.send(StoreEvent::new(kind, object.clone())).await;
    }
    subscribers.retain(|tx| !tx.is_closed());
}
