//! Core type definitions for cfgplane.
//!
//! This crate defines the data model shared by the stores, the model plugin
//! registry and the controllers:
//! - Transaction, target and index identifiers
//! - Typed configuration values and path-value records
//! - Transactions (ordered configuration intents) and their lifecycle states
//! - Configurations (per-target materialized state)
//! - gNMI-style configuration paths

mod configuration;
mod ids;
mod path;
mod transaction;
mod value;

pub use configuration::{Configuration, ConfigurationState, ConfigurationStatus};
pub use ids::{Index, Revision, TargetId, TargetType, TargetVersion, TransactionId};
pub use path::{Path, PathElem};
pub use transaction::{
    Change, Source, Transaction, TransactionChange, TransactionPayload, TransactionRollback,
    TransactionState, TransactionStatus,
};
pub use value::{PathValue, TypedValue, ValueType};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}
