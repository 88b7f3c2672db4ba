//! Controllers for the cfgplane control plane.
//!
//! Clients submit configuration intents as transactions. The transaction
//! controller validates each one against the model plugin for every target
//! it touches and merges it into the targets' configurations, strictly in
//! index order.
//!
//! # Components
//!
//! - **Controller**: a generic watch → queue → worker loop with per-id
//!   single-flight and retry with backoff
//! - **Watchers**: turn transaction and configuration store events into
//!   transaction ids
//! - **Reconciler**: the transaction state machine
//! - **Tree**: builds the JSON documents plugins validate
//!
//! # Example
//!
//! ```no_run
//! use cfgplane_controller::{transaction, ControllerConfig, DEFAULT_RECONCILE_TIMEOUT};
//! use cfgplane_registry::{ClientConfig, PluginRegistry, TlsConfig};
//! use cfgplane_store::{MemoryConfigurationStore, MemoryTransactionStore};
//! use std::sync::Arc;
//!
//! # async fn run() -> cfgplane_controller::ControllerResult<()> {
//! let client = ClientConfig {
//!     tls: Some(TlsConfig {
//!         client_cert: "client.crt".into(),
//!         client_key: "client.key".into(),
//!     }),
//!     ..Default::default()
//! };
//! let registry = Arc::new(PluginRegistry::new(vec![5150], client));
//! registry.start();
//!
//! let controller = transaction::new_controller(
//!     Arc::new(MemoryTransactionStore::new()),
//!     Arc::new(MemoryConfigurationStore::new()),
//!     registry,
//!     ControllerConfig::default(),
//!     DEFAULT_RECONCILE_TIMEOUT,
//! );
//! controller.start().await?;
//! # Ok(())
//! # }
//! ```

mod controller;
mod error;
mod queue;
pub mod transaction;
pub mod tree;

pub use controller::{Controller, ControllerConfig, ReconcileResult, Reconciler, Watcher};
pub use error::{ControllerError, ControllerResult};
pub use queue::WorkQueue;
pub use transaction::DEFAULT_RECONCILE_TIMEOUT;
