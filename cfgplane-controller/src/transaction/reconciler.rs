//! The transaction state machine.
//!
//! Each pass loads one transaction and advances it by at most one state:
//!
//! ```text
//! PENDING ──▶ VALIDATING ──▶ APPLYING ──▶ COMPLETE
//!                  │
//!                  └──▶ FAILED
//! ```
//!
//! Ordering between transactions comes from the PENDING check alone: a
//! transaction only starts validating once the transaction at the previous
//! index is terminal or gone. All writes are conditional on the revision that
//! was read, and a lost race (conflict or not-found) ends the pass quietly;
//! the watchers deliver the id again if more work remains.

use crate::controller::{ReconcileResult, Reconciler};
use crate::error::{ControllerError, ControllerResult};
use crate::tree::build_document;
use async_trait::async_trait;
use cfgplane_registry::{ModelPlugin, PluginRegistry, RegistryError};
use cfgplane_store::{ConfigurationStore, StoreError, TransactionStore};
use cfgplane_types::{
    Change, ConfigurationState, ConfigurationStatus, Source, TargetId, Transaction,
    TransactionId, TransactionPayload, TransactionState,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Deadline for a single reconcile pass.
pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TransactionReconciler {
    transactions: Arc<dyn TransactionStore>,
    configurations: Arc<dyn ConfigurationStore>,
    registry: Arc<PluginRegistry>,
    timeout: Duration,
}

impl TransactionReconciler {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        configurations: Arc<dyn ConfigurationStore>,
        registry: Arc<PluginRegistry>,
    ) -> Self {
        Self {
            transactions,
            configurations,
            registry,
            timeout: DEFAULT_RECONCILE_TIMEOUT,
        }
    }

    /// Overrides the per-pass deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn reconcile_transaction(&self, id: &TransactionId) -> ControllerResult<ReconcileResult> {
        let transaction = match self.transactions.get(id).await {
            Ok(transaction) => transaction,
            Err(e) if e.is_not_found() => {
                debug!(id = %id, "Transaction no longer exists");
                return Ok(ReconcileResult::done());
            }
            Err(e) => return Err(e.into()),
        };

        match transaction.payload {
            TransactionPayload::Change(_) => self.reconcile_change(transaction).await,
            TransactionPayload::Rollback(_) => {
                Err(ControllerError::RollbackNotSupported(transaction.id))
            }
        }
    }

    async fn reconcile_change(&self, transaction: Transaction) -> ControllerResult<ReconcileResult> {
        match transaction.status.state {
            TransactionState::Pending => self.reconcile_pending(transaction).await,
            TransactionState::Validating => self.reconcile_validating(transaction).await,
            TransactionState::Applying => self.reconcile_applying(transaction).await,
            TransactionState::Complete | TransactionState::Failed => Ok(ReconcileResult::done()),
        }
    }

    // ── PENDING ─────────────────────────────────────────────────────

    async fn reconcile_pending(&self, mut transaction: Transaction) -> ControllerResult<ReconcileResult> {
        if let Some(prev) = transaction.index.prev() {
            match self.transactions.get_by_index(prev).await {
                Ok(predecessor) if !predecessor.is_terminal() => {
                    debug!(
                        id = %transaction.id,
                        predecessor = %predecessor.id,
                        state = %predecessor.state(),
                        "Waiting for predecessor"
                    );
                    return Ok(ReconcileResult::done());
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        transaction.status.state = TransactionState::Validating;
        self.update_transaction(transaction).await
    }

    // ── VALIDATING ──────────────────────────────────────────────────

    async fn reconcile_validating(&self, mut transaction: Transaction) -> ControllerResult<ReconcileResult> {
        let rejected = self.validate_changes(&transaction).await?;

        transaction.status.state = match rejected {
            Some(target) => {
                info!(id = %transaction.id, target = %target, "Transaction failed validation");
                TransactionState::Failed
            }
            None => TransactionState::Applying,
        };
        self.update_transaction(transaction).await
    }

    /// Validates each target in order and returns the first one whose
    /// document is rejected.
    async fn validate_changes(&self, transaction: &Transaction) -> ControllerResult<Option<TargetId>> {
        for change in changes(transaction) {
            let plugin = self.plugin_for(change).await?;

            let document = match build_document(&change.values) {
                Ok(document) => document,
                Err(e) => {
                    warn!(id = %transaction.id, target = %change.target_id, error = %e, "Malformed change");
                    return Ok(Some(change.target_id.clone()));
                }
            };

            match plugin.validate(&document).await {
                Ok(()) => {}
                Err(e) if e.is_invalid_config() => return Ok(Some(change.target_id.clone())),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    async fn plugin_for(&self, change: &Change) -> ControllerResult<Arc<ModelPlugin>> {
        self.registry
            .get_plugin(&change.model_id())
            .await
            .map_err(|e| match e {
                RegistryError::PluginNotFound(model) => ControllerError::PluginNotFound {
                    target: change.target_id.clone(),
                    model,
                },
                other => other.into(),
            })
    }

    // ── APPLYING ────────────────────────────────────────────────────

    async fn reconcile_applying(&self, mut transaction: Transaction) -> ControllerResult<ReconcileResult> {
        if transaction.atomic {
            return Err(ControllerError::AtomicNotSupported(transaction.id));
        }

        // All targets are loaded before the first write; one missing target
        // leaves every configuration untouched.
        let mut targets = Vec::new();
        for change in changes(&transaction) {
            match self.configurations.get(&change.target_id).await {
                Ok(configuration) => targets.push((change, configuration)),
                Err(e) if e.is_not_found() => {
                    debug!(id = %transaction.id, target = %change.target_id, "Configuration not ready");
                    return Ok(ReconcileResult::done());
                }
                Err(e) => return Err(e.into()),
            }
        }

        let index = transaction.index;
        let mut sources = BTreeMap::new();

        for (change, mut configuration) in targets {
            let mut source = Source::default();
            for value in &change.values {
                configuration
                    .values
                    .insert(value.path.clone(), value.stamped(index));
                source.values.insert(value.path.clone(), index);
            }
            configuration.status = ConfigurationStatus {
                state: ConfigurationState::Pending,
                transaction_index: index,
            };

            match self.configurations.update(configuration).await {
                Ok(_) => {}
                Err(e) if is_benign(&e) => {
                    debug!(id = %transaction.id, target = %change.target_id, error = %e, "Configuration write lost");
                    return Ok(ReconcileResult::done());
                }
                Err(e) => return Err(e.into()),
            }
            sources.insert(change.target_id.clone(), source);
        }

        transaction.status.sources = sources;
        transaction.status.state = TransactionState::Complete;
        self.update_transaction(transaction).await
    }

    /// Writes the transaction back. A lost race ends the pass without error.
    async fn update_transaction(&self, transaction: Transaction) -> ControllerResult<ReconcileResult> {
        let id = transaction.id.clone();
        let state = transaction.state();
        match self.transactions.update(transaction).await {
            Ok(_) => {
                info!(id = %id, state = %state, "Transaction advanced");
                Ok(ReconcileResult::done())
            }
            Err(e) if is_benign(&e) => {
                debug!(id = %id, error = %e, "Transaction write lost");
                Ok(ReconcileResult::done())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Reconciler<TransactionId> for TransactionReconciler {
    async fn reconcile(&self, id: TransactionId) -> ControllerResult<ReconcileResult> {
        match tokio::time::timeout(self.timeout, self.reconcile_transaction(&id)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(id = %id, timeout_ms = self.timeout.as_millis() as u64, "Reconcile deadline exceeded");
                Err(ControllerError::DeadlineExceeded(self.timeout))
            }
        }
    }
}

fn changes(transaction: &Transaction) -> &[Change] {
    match &transaction.payload {
        TransactionPayload::Change(change) => &change.changes,
        TransactionPayload::Rollback(_) => &[],
    }
}

fn is_benign(err: &StoreError) -> bool {
    err.is_conflict() || err.is_not_found()
}
