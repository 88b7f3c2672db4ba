//! Change events published by the stores.

/// What happened to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventKind {
    /// Sent once per existing object when a watch is opened with replay.
    Replayed,
    Created,
    Updated,
    Deleted,
}

/// A change to a stored object, carrying the object as written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent<T> {
    pub kind: StoreEventKind,
    pub object: T,
}

impl<T> StoreEvent<T> {
    pub fn new(kind: StoreEventKind, object: T) -> Self {
        Self { kind, object }
    }
}

/// Options for opening a watch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Deliver every existing object as a `Replayed` event before live events.
    pub replay: bool,
}

impl WatchOptions {
    #[must_use]
    pub fn with_replay() -> Self {
        Self { replay: true }
    }
}
