//! Event bus.
//!
//! Delivers published events to subscribed handlers synchronously and in
//! a documented order: handlers for the event's kind first, wildcard
//! handlers after, each group in subscription order. One handler's
//! failure never blocks the rest; failures are collected and returned to
//! the publisher.

pub mod bus;
pub mod error;
pub mod handler;

pub use bus::{EventBus, PublishReport, SubscriptionId, Topic};
pub use error::{HandlerError, HandlerFailure};
pub use handler::EventHandler;
