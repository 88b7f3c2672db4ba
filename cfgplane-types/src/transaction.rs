//! Transactions: globally ordered units of configuration intent.
//!
//! A transaction is created by a client in the `Pending` state and is then
//! owned by the transaction reconciler, which moves it forward one state at
//! a time until it is `Complete` or `Failed`.

use crate::{Index, PathValue, Revision, TargetId, TargetType, TargetVersion, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    #[default]
    Pending,
    Validating,
    Applying,
    Complete,
    Failed,
}

impl TransactionState {
    /// `Complete` and `Failed` are terminal; a terminal transaction is never
    /// reopened.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Validating => "VALIDATING",
            Self::Applying => "APPLYING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// The paths a transaction wrote to one target, with the index stamped on
/// each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub values: BTreeMap<String, Index>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub state: TransactionState,
    #[serde(default)]
    pub sources: BTreeMap<TargetId, Source>,
}

/// The changes a transaction makes to a single target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub target_id: TargetId,
    pub target_type: TargetType,
    pub target_version: TargetVersion,
    pub values: Vec<PathValue>,
}

impl Change {
    pub fn new(
        target_id: impl Into<TargetId>,
        target_type: impl Into<TargetType>,
        target_version: impl Into<TargetVersion>,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            target_type: target_type.into(),
            target_version: target_version.into(),
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: PathValue) -> Self {
        self.values.push(value);
        self
    }

    /// Identity of the model plugin that validates this target,
    /// `"{type}-{version}"`.
    #[must_use]
    pub fn model_id(&self) -> String {
        format!("{}-{}", self.target_type, self.target_version)
    }
}

/// An ordered set of per-target changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionChange {
    pub changes: Vec<Change>,
}

/// A request to undo the transaction at `rollback_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRollback {
    pub rollback_index: Index,
}

/// What a transaction does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "details", rename_all = "snake_case")]
pub enum TransactionPayload {
    Change(TransactionChange),
    Rollback(TransactionRollback),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Assigned by the store on create; immutable afterwards.
    #[serde(default)]
    pub index: Index,
    #[serde(default)]
    pub revision: Revision,
    /// Whether all targets must be applied as one unit.
    #[serde(default)]
    pub atomic: bool,
    pub payload: TransactionPayload,
    #[serde(default)]
    pub status: TransactionStatus,
}

impl Transaction {
    /// Creates a pending change transaction.
    pub fn change(id: impl Into<TransactionId>, changes: Vec<Change>) -> Self {
        Self::new(
            id,
            TransactionPayload::Change(TransactionChange { changes }),
        )
    }

    /// Creates a pending rollback transaction.
    pub fn rollback(id: impl Into<TransactionId>, rollback_index: Index) -> Self {
        Self::new(
            id,
            TransactionPayload::Rollback(TransactionRollback { rollback_index }),
        )
    }

    fn new(id: impl Into<TransactionId>, payload: TransactionPayload) -> Self {
        Self {
            id: id.into(),
            index: Index::NONE,
            revision: Revision::default(),
            atomic: false,
            payload,
            status: TransactionStatus::default(),
        }
    }

    /// Marks the transaction as atomic.
    pub fn with_atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.status.state
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }
}
