use thiserror::Error;

use aggregate_store::{StoreError, ValidationError};
use common::{AggregateId, Version};
use event_log::EventLogError;

/// Errors surfaced to command issuers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The aggregate id is unknown.
    #[error("aggregate not found: {0}")]
    NotFound(AggregateId),

    /// An insert-only command targeted an existing aggregate.
    #[error("aggregate already exists: {0}")]
    AlreadyExists(AggregateId),

    /// The issuer's view was stale and retries were exhausted (or the
    /// command no longer validated against the refreshed state).
    #[error(
        "version conflict for aggregate {aggregate_id} after {attempts} attempts: expected {expected}, found {actual}"
    )]
    Conflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
        attempts: u32,
    },

    /// A domain rule rejected the command; terminal, never retried.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The event log failed.
    #[error("event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// An event payload failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Undo was requested but the aggregate has no recorded history.
    #[error("nothing to undo for aggregate {0}")]
    NothingToUndo(AggregateId),
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => PipelineError::NotFound(id),
            StoreError::AlreadyExists(id) => PipelineError::AlreadyExists(id),
            StoreError::Conflict {
                aggregate_id,
                expected,
                actual,
            } => PipelineError::Conflict {
                aggregate_id,
                expected,
                actual,
                attempts: 1,
            },
            StoreError::Rejected(v) => PipelineError::Validation(v),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
