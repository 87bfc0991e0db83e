//! Versioned aggregate store.
//!
//! Holds the current state of each order aggregate together with its
//! version counter, and exposes an optimistic-locked read/commit API.
//! Commits on one aggregate are linearized; commits on different
//! aggregates proceed independently.

pub mod aggregate;
pub mod error;
pub mod status;
pub mod store;

pub use aggregate::{Aggregate, AggregateState};
pub use error::{Result, StoreError, ValidationError};
pub use status::OrderStatus;
pub use store::{AggregateStore, Committed};
