//! Error types for the store layer.

use cfgplane_types::Revision;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An object with the same id already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The writer's revision is stale.
    #[error("write conflict on {id}: expected revision {expected}, stored revision {actual}")]
    Conflict {
        id: String,
        expected: Revision,
        actual: Revision,
    },

    /// The write is malformed (e.g. it changes an immutable field).
    #[error("invalid write: {0}")]
    Invalid(String),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
