//! Versioned object stores for cfgplane.
//!
//! Provides the store contract consumed by the controllers plus in-memory
//! implementations of it.
//!
//! # Contract
//!
//! - Every object carries a [`Revision`](cfgplane_types::Revision). Updates
//!   succeed only if the caller's revision matches the stored one; a stale
//!   writer gets [`StoreError::Conflict`].
//! - Transactions are assigned a gap-free, monotonically increasing
//!   [`Index`](cfgplane_types::Index) at creation, which never changes.
//! - Watchers receive one [`StoreEvent`] per committed write, in commit order.
//!   Delivery waits for channel capacity, so subscribers must keep draining.

mod configuration_store;
mod error;
mod event;
mod table;
mod transaction_store;

pub use configuration_store::{ConfigurationStore, MemoryConfigurationStore};
pub use error::{StoreError, StoreResult};
pub use event::{StoreEvent, StoreEventKind, WatchOptions};
pub use transaction_store::{MemoryTransactionStore, TransactionStore};
