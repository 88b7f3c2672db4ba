//! Error types for the controllers.

use cfgplane_registry::RegistryError;
use cfgplane_store::StoreError;
use cfgplane_types::{TargetId, TransactionId};
use std::time::Duration;
use thiserror::Error;

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// No plugin is registered for the target's type and version.
    #[error("no model plugin '{model}' for target '{target}'")]
    PluginNotFound { target: TargetId, model: String },

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("atomic transactions are not supported: {0}")]
    AtomicNotSupported(TransactionId),

    #[error("rollback transactions are not supported: {0}")]
    RollbackNotSupported(TransactionId),

    #[error("reconcile deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("channel closed")]
    ChannelClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<cfgplane_types::Error> for ControllerError {
    fn from(err: cfgplane_types::Error) -> Self {
        match err {
            cfgplane_types::Error::InvalidPath { path, reason } => Self::InvalidPath { path, reason },
            cfgplane_types::Error::Serialization(e) => Self::Serialization(e),
        }
    }
}
