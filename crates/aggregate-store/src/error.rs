use thiserror::Error;

use common::{AggregateId, Version};

/// A domain-level rejection raised by a mutator.
///
/// Validation failures abort a commit without bumping the version and are
/// never retried; they are distinct from version conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {reason}")]
pub struct ValidationError {
    /// Why the mutation was rejected (e.g. "insufficient stock").
    pub reason: String,
}

impl ValidationError {
    /// Creates a validation error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors produced by the aggregate store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The aggregate id is unknown.
    #[error("aggregate not found: {0}")]
    NotFound(AggregateId),

    /// An insert-only commit targeted an id that already exists.
    #[error("aggregate already exists: {0}")]
    AlreadyExists(AggregateId),

    /// The caller's expected version is stale.
    #[error("version conflict for aggregate {aggregate_id}: expected {expected}, found {actual}")]
    Conflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The mutator rejected the mutation on domain grounds.
    #[error(transparent)]
    Rejected(#[from] ValidationError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
