use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an aggregate instance (one order).
///
/// Aggregate ids are caller-chosen strings such as `"ORD-1001"`. Wrapping
/// them in a newtype keeps them from being mixed up with other string keys
/// (reservation ids, payment ids, event kinds).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(String);

impl AggregateId {
    /// Creates an aggregate ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random aggregate ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AggregateId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AggregateId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Version number for an aggregate, used for optimistic concurrency control.
///
/// A new aggregate is at version 0; every successful mutation bumps the
/// version by exactly 1, so the version after N commits is N.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of an aggregate that has never been mutated.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) produced by the first successful mutation.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// Position of an event in one aggregate's log.
///
/// Sequences are per-aggregate, start at 1, and are gapless: the log
/// assigns them in append order and never reuses or skips a value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceNumber(i64);

impl SequenceNumber {
    /// Creates a sequence number from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the first sequence number (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next sequence number.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw sequence value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SequenceNumber {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// The kind of a state-changing event.
///
/// Kinds form an open set: the constants below cover the order lifecycle,
/// and workers are free to mint their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKind(String);

impl EventKind {
    /// An order aggregate was created.
    pub const ORDER_CREATED: &'static str = "ORDER_CREATED";
    /// Inventory was checked and reserved for an order.
    pub const INVENTORY_CHECKED: &'static str = "INVENTORY_CHECKED";
    /// Payment was captured for an order.
    pub const PAYMENT_PROCESSED: &'static str = "PAYMENT_PROCESSED";
    /// An order was handed to shipping.
    pub const ORDER_SHIPPED: &'static str = "ORDER_SHIPPED";
    /// An order reached its terminal success state.
    pub const ORDER_COMPLETED: &'static str = "ORDER_COMPLETED";
    /// An order failed and downstream workers should compensate.
    pub const ORDER_FAILED: &'static str = "ORDER_FAILED";
    /// An order was cancelled.
    pub const ORDER_CANCELLED: &'static str = "ORDER_CANCELLED";
    /// A prior payload was restored by an undo command.
    pub const STATE_RESTORED: &'static str = "STATE_RESTORED";

    /// Creates an event kind from a string.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Returns the kind as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn order_created() -> Self {
        Self::new(Self::ORDER_CREATED)
    }

    pub fn inventory_checked() -> Self {
        Self::new(Self::INVENTORY_CHECKED)
    }

    pub fn payment_processed() -> Self {
        Self::new(Self::PAYMENT_PROCESSED)
    }

    pub fn order_shipped() -> Self {
        Self::new(Self::ORDER_SHIPPED)
    }

    pub fn order_completed() -> Self {
        Self::new(Self::ORDER_COMPLETED)
    }

    pub fn order_failed() -> Self {
        Self::new(Self::ORDER_FAILED)
    }

    pub fn order_cancelled() -> Self {
        Self::new(Self::ORDER_CANCELLED)
    }

    pub fn state_restored() -> Self {
        Self::new(Self::STATE_RESTORED)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventKind {
    fn from(kind: &str) -> Self {
        Self(kind.to_string())
    }
}

impl From<String> for EventKind {
    fn from(kind: String) -> Self {
        Self(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_id_generate_creates_unique_ids() {
        let id1 = AggregateId::generate();
        let id2 = AggregateId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn aggregate_id_preserves_value() {
        let id = AggregateId::new("ORD-1001");
        assert_eq!(id.as_str(), "ORD-1001");
        assert_eq!(id.to_string(), "ORD-1001");
    }

    #[test]
    fn aggregate_id_serialization_roundtrip() {
        let id = AggregateId::new("ORD-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ORD-42\"");
        let deserialized: AggregateId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn version_initial_and_first() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::first().as_i64(), 1);
        assert_eq!(Version::initial().next(), Version::first());
    }

    #[test]
    fn version_ordering() {
        let v1 = Version::new(1);
        let v2 = Version::new(2);
        assert!(v1 < v2);
        assert_eq!(v1.next(), v2);
    }

    #[test]
    fn sequence_starts_at_one() {
        assert_eq!(SequenceNumber::first().as_i64(), 1);
        assert_eq!(SequenceNumber::first().next().as_i64(), 2);
    }

    #[test]
    fn event_kind_constants_match_wire_names() {
        assert_eq!(EventKind::order_created().as_str(), "ORDER_CREATED");
        assert_eq!(EventKind::inventory_checked().as_str(), "INVENTORY_CHECKED");
        assert_eq!(EventKind::payment_processed().as_str(), "PAYMENT_PROCESSED");
        assert_eq!(EventKind::order_shipped().as_str(), "ORDER_SHIPPED");
        assert_eq!(EventKind::state_restored().as_str(), "STATE_RESTORED");
    }

    #[test]
    fn event_kind_open_set() {
        let custom = EventKind::new("LOYALTY_POINTS_GRANTED");
        assert_eq!(custom.as_str(), "LOYALTY_POINTS_GRANTED");
        assert_ne!(custom, EventKind::order_created());
    }
}
