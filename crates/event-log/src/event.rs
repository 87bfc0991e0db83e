use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{AggregateId, EventKind, SequenceNumber, Version};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable record of one committed state change.
///
/// Events are appended exactly once, never mutated or deleted. The
/// `payload` carries the state delta (the committed aggregate state) or
/// contextual data; `caused_by_version` is the aggregate version the
/// recorded mutation produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// Position in the owning aggregate's log; gapless, starts at 1.
    pub sequence: SequenceNumber,

    /// The aggregate this event belongs to.
    pub aggregate_id: AggregateId,

    /// What happened (e.g. `ORDER_CREATED`, `INVENTORY_CHECKED`).
    pub kind: EventKind,

    /// State delta or contextual data.
    pub payload: serde_json::Value,

    /// The aggregate version produced by the mutation this event records.
    pub caused_by_version: Version,

    /// When the event was appended.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates an event with a fresh id and the current timestamp.
    ///
    /// Only the log assigns sequences; this constructor is used by log
    /// implementations during append.
    pub(crate) fn record(
        sequence: SequenceNumber,
        aggregate_id: AggregateId,
        kind: EventKind,
        payload: serde_json::Value,
        caused_by_version: Version,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            sequence,
            aggregate_id,
            kind,
            payload,
            caused_by_version,
            timestamp: Utc::now(),
        }
    }
}
