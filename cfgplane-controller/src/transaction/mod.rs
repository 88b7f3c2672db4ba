//! Transaction controller: drives transactions from PENDING to a terminal
//! state, one at a time in index order.

mod reconciler;
mod watcher;

pub use reconciler::{DEFAULT_RECONCILE_TIMEOUT, TransactionReconciler};
pub use watcher::{ConfigurationWatcher, TransactionWatcher};

use crate::controller::{Controller, ControllerConfig};
use cfgplane_registry::PluginRegistry;
use cfgplane_store::{ConfigurationStore, TransactionStore};
use cfgplane_types::TransactionId;
use std::sync::Arc;
use std::time::Duration;

/// Name the transaction controller logs under.
pub const CONTROLLER_NAME: &str = "transaction";

/// Wires the transaction reconciler to watchers on both stores.
pub fn new_controller(
    transactions: Arc<dyn TransactionStore>,
    configurations: Arc<dyn ConfigurationStore>,
    registry: Arc<PluginRegistry>,
    config: ControllerConfig,
    reconcile_timeout: Duration,
) -> Controller<TransactionId> {
    let reconciler = TransactionReconciler::new(
        Arc::clone(&transactions),
        Arc::clone(&configurations),
        registry,
    )
    .with_timeout(reconcile_timeout);

    let mut controller = Controller::new(CONTROLLER_NAME, config, Arc::new(reconciler));
    controller
        .watch(Arc::new(TransactionWatcher::new(Arc::clone(&transactions))))
        .watch(Arc::new(ConfigurationWatcher::new(configurations, transactions)));
    controller
}
