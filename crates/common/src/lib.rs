//! Shared identifier and versioning types used across the coordination crates.

mod types;

pub use types::{AggregateId, EventKind, SequenceNumber, Version};
