use cfgplane_store::{
    MemoryTransactionStore, StoreError, StoreEventKind, TransactionStore, WatchOptions,
};
use cfgplane_types::{Index, Revision, Transaction, TransactionId, TransactionState};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn change(id: &str) -> Transaction {
    Transaction::change(id, vec![])
}

// ── Create / get ──────────────────────────────────────────────────

#[tokio::test]
async fn create_assigns_sequential_indexes() {
    let store = MemoryTransactionStore::new();
    let t1 = store.create(change("change-1")).await.unwrap();
    let t2 = store.create(change("change-2")).await.unwrap();
    let t3 = store.create(change("change-3")).await.unwrap();

    assert_eq!(t1.index, Index::new(1));
    assert_eq!(t2.index, Index::new(2));
    assert_eq!(t3.index, Index::new(3));
    assert_eq!(t1.revision, Revision::new(1));
}

#[tokio::test]
async fn create_ignores_caller_index() {
    let store = MemoryTransactionStore::new();
    let mut t = change("change-1");
    t.index = Index::new(42);
    let created = store.create(t).await.unwrap();
    assert_eq!(created.index, Index::new(1));
}

#[tokio::test]
async fn create_duplicate_fails() {
    let store = MemoryTransactionStore::new();
    store.create(change("change-1")).await.unwrap();
    let err = store.create(change("change-1")).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn get_and_get_by_index() {
    let store = MemoryTransactionStore::new();
    store.create(change("change-1")).await.unwrap();
    store.create(change("change-2")).await.unwrap();

    let by_id = store.get(&TransactionId::new("change-2")).await.unwrap();
    let by_index = store.get_by_index(Index::new(2)).await.unwrap();
    assert_eq!(by_id, by_index);
}

#[tokio::test]
async fn missing_objects_are_not_found() {
    let store = MemoryTransactionStore::new();
    assert!(store.get(&"nope".into()).await.unwrap_err().is_not_found());
    assert!(store.get_by_index(Index::new(1)).await.unwrap_err().is_not_found());
    assert!(store.get_by_index(Index::NONE).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn list_is_in_index_order() {
    let store = MemoryTransactionStore::new();
    for id in ["zulu", "alpha", "mike"] {
        store.create(change(id)).await.unwrap();
    }
    let ids: Vec<_> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id.to_string())
        .collect();
    assert_eq!(ids, vec!["zulu", "alpha", "mike"]);
}

// ── Update ────────────────────────────────────────────────────────

#[tokio::test]
async fn update_bumps_revision() {
    let store = MemoryTransactionStore::new();
    let mut t = store.create(change("change-1")).await.unwrap();
    t.status.state = TransactionState::Validating;
    let updated = store.update(t).await.unwrap();

    assert_eq!(updated.revision, Revision::new(2));
    let stored = store.get(&"change-1".into()).await.unwrap();
    assert_eq!(stored.state(), TransactionState::Validating);
}

#[tokio::test]
async fn stale_update_conflicts() {
    let store = MemoryTransactionStore::new();
    let t = store.create(change("change-1")).await.unwrap();
    let stale = t.clone();

    let mut fresh = t;
    fresh.status.state = TransactionState::Validating;
    store.update(fresh).await.unwrap();

    let mut stale = stale;
    stale.status.state = TransactionState::Failed;
    let err = store.update(stale).await.unwrap_err();
    assert!(err.is_conflict());
    match err {
        StoreError::Conflict { expected, actual, .. } => {
            assert_eq!(expected, Revision::new(1));
            assert_eq!(actual, Revision::new(2));
        }
        other => panic!("Expected Conflict, got {other:?}"),
    }

    let stored = store.get(&"change-1".into()).await.unwrap();
    assert_eq!(stored.state(), TransactionState::Validating);
}

#[tokio::test]
async fn update_missing_is_not_found() {
    let store = MemoryTransactionStore::new();
    let err = store.update(change("ghost")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn update_cannot_change_index() {
    let store = MemoryTransactionStore::new();
    let mut t = store.create(change("change-1")).await.unwrap();
    t.index = Index::new(9);
    let err = store.update(t).await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[tokio::test]
async fn delete_removes_index_entry() {
    let store = MemoryTransactionStore::new();
    store.create(change("change-1")).await.unwrap();
    store.delete(&"change-1".into()).await.unwrap();
    assert!(store.get_by_index(Index::new(1)).await.unwrap_err().is_not_found());

    // Indexes are never reused.
    let next = store.create(change("change-2")).await.unwrap();
    assert_eq!(next.index, Index::new(2));
}

// ── Watch ─────────────────────────────────────────────────────────

#[tokio::test]
async fn watch_delivers_events_in_order() {
    let store = MemoryTransactionStore::new();
    let (tx, mut rx) = mpsc::channel(16);
    store.watch(tx, WatchOptions::default()).await.unwrap();

    let mut t = store.create(change("change-1")).await.unwrap();
    t.status.state = TransactionState::Validating;
    store.update(t).await.unwrap();
    store.delete(&"change-1".into()).await.unwrap();

    let kinds: Vec<_> = [
        rx.recv().await.unwrap(),
        rx.recv().await.unwrap(),
        rx.recv().await.unwrap(),
    ]
    .into_iter()
    .map(|e| e.kind)
    .collect();
    assert_eq!(
        kinds,
        vec![
            StoreEventKind::Created,
            StoreEventKind::Updated,
            StoreEventKind::Deleted
        ]
    );
}

#[tokio::test]
async fn watch_with_replay_sends_existing_first() {
    let store = MemoryTransactionStore::new();
    store.create(change("change-1")).await.unwrap();
    store.create(change("change-2")).await.unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    store.watch(tx, WatchOptions::with_replay()).await.unwrap();
    store.create(change("change-3")).await.unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    let third = rx.recv().await.unwrap();
    assert_eq!(first.kind, StoreEventKind::Replayed);
    assert_eq!(first.object.id.as_str(), "change-1");
    assert_eq!(second.object.id.as_str(), "change-2");
    assert_eq!(third.kind, StoreEventKind::Created);
    assert_eq!(third.object.index, Index::new(3));
}

#[tokio::test]
async fn dropped_watcher_does_not_block_writes() {
    let store = MemoryTransactionStore::new();
    let (tx, rx) = mpsc::channel(1);
    store.watch(tx, WatchOptions::default()).await.unwrap();
    drop(rx);

    let created = timeout(Duration::from_secs(1), async {
        store.create(change("change-1")).await.unwrap();
        store.create(change("change-2")).await.unwrap()
    })
    .await
    .expect("writes blocked by a closed watcher");
    assert_eq!(created.index, Index::new(2));
}

#[tokio::test]
async fn reads_are_not_blocked_by_slow_watcher() {
    let store = std::sync::Arc::new(MemoryTransactionStore::new());
    let (tx, mut rx) = mpsc::channel(1);
    store.watch(tx, WatchOptions::default()).await.unwrap();

    store.create(change("change-1")).await.unwrap();
    // The channel is full; this write waits for the watcher.
    let writer = {
        let store = store.clone();
        tokio::spawn(async move { store.create(change("change-2")).await })
    };
    tokio::task::yield_now().await;

    let read = timeout(Duration::from_secs(1), store.get(&"change-1".into()))
        .await
        .expect("read blocked behind event delivery");
    assert!(read.is_ok());

    rx.recv().await.unwrap();
    rx.recv().await.unwrap();
    writer.await.unwrap().unwrap();
}
