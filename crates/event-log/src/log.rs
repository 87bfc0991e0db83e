use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use common::{AggregateId, EventKind, SequenceNumber, Version};

use crate::{Event, Result};

/// A lazily produced stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event>> + Send>>;

/// Core trait for event log implementations.
///
/// The log exclusively owns sequence assignment: `append` hands out the
/// next gapless per-aggregate sequence. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends one event, assigning it the next sequence for the
    /// aggregate (strictly after any previously appended event for the
    /// same id), and returns the stored record.
    async fn append(
        &self,
        aggregate_id: &AggregateId,
        kind: EventKind,
        payload: serde_json::Value,
        caused_by_version: Version,
    ) -> Result<Event>;

    /// Replays all events for one aggregate in sequence order.
    ///
    /// The stream is lazy, finite, and restartable: every call starts a
    /// fresh pass from sequence 1. Replay is the supported mechanism for
    /// reconstructing aggregate state when the store is rebuilt from
    /// scratch.
    async fn replay(&self, aggregate_id: &AggregateId) -> Result<EventStream>;

    /// Returns all events for one aggregate, eagerly collected.
    async fn events_for(&self, aggregate_id: &AggregateId) -> Result<Vec<Event>>;

    /// Returns all events of one kind across aggregates, in append order.
    async fn events_by_kind(&self, kind: &EventKind) -> Result<Vec<Event>>;

    /// Returns the highest sequence assigned for an aggregate, or `None`
    /// if it has no events.
    async fn last_sequence(&self, aggregate_id: &AggregateId) -> Result<Option<SequenceNumber>>;

    /// Returns every aggregate id that has at least one event.
    async fn aggregate_ids(&self) -> Result<Vec<AggregateId>>;
}

/// Extension trait providing convenience methods for event logs.
#[async_trait]
pub trait EventLogExt: EventLog {
    /// Returns true if the aggregate has any events.
    async fn has_events(&self, aggregate_id: &AggregateId) -> Result<bool> {
        Ok(self.last_sequence(aggregate_id).await?.is_some())
    }

    /// Returns the number of events recorded for an aggregate.
    async fn event_count_for(&self, aggregate_id: &AggregateId) -> Result<usize> {
        Ok(self
            .last_sequence(aggregate_id)
            .await?
            .map(|seq| seq.as_i64() as usize)
            .unwrap_or(0))
    }
}

// Blanket implementation for all EventLog implementations
impl<T: EventLog + ?Sized> EventLogExt for T {}
