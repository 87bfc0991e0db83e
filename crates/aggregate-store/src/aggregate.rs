//! The order aggregate and its mutable state.

use chrono::{DateTime, Utc};
use common::{AggregateId, Version};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::status::OrderStatus;

/// The mutable part of an aggregate: its status plus a map of domain
/// fields (items, amounts, shipping address, reference ids).
///
/// Workers never mutate this directly; a commit's mutator receives the
/// current state and returns the replacement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateState {
    /// Current lifecycle status.
    pub status: OrderStatus,

    /// Domain payload fields.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl AggregateState {
    /// Creates an empty state in the given status.
    pub fn new(status: OrderStatus) -> Self {
        Self {
            status,
            fields: Map::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Sets a payload field, replacing any previous value.
    pub fn set_field(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Looks up a payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a copy of this state with a different status.
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }
}

/// An aggregate as held by the store: identity, state, and the version
/// counter guarding concurrent mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregate {
    /// Unique aggregate id.
    pub id: AggregateId,

    /// Current status and payload.
    pub state: AggregateState,

    /// Optimistic-lock version; bumps by exactly 1 per successful commit.
    pub version: Version,

    /// When the aggregate was last committed.
    pub updated_at: DateTime<Utc>,
}

impl Aggregate {
    /// Creates an aggregate at version 1 from the state produced by an
    /// insert commit.
    pub(crate) fn created(id: AggregateId, state: AggregateState) -> Self {
        Self {
            id,
            state,
            version: Version::first(),
            updated_at: Utc::now(),
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> OrderStatus {
        self.state.status
    }

    /// Looks up a payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.state.field(key)
    }
}
