use thiserror::Error;

use common::{AggregateId, SequenceNumber};

/// Errors that can occur when interacting with the event log.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// Two appends raced for the same per-aggregate sequence slot.
    ///
    /// Within one process the store's per-aggregate commit lock already
    /// orders appends; this surfaces when a second process shares the
    /// same persistent log.
    #[error("sequence conflict for aggregate {aggregate_id}: sequence {sequence} already taken")]
    SequenceConflict {
        aggregate_id: AggregateId,
        sequence: SequenceNumber,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event log operations.
pub type Result<T> = std::result::Result<T, EventLogError>;
