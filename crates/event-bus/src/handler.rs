use async_trait::async_trait;
use event_log::Event;

use crate::error::HandlerError;

/// A subscriber that reacts to published events.
///
/// Handlers run on the publisher's task during `publish`. A handler may
/// itself publish further events or register new subscriptions; the bus
/// snapshots its subscription table before each dispatch pass, so
/// re-entrant calls are safe.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Returns the handler's name, used in failure reports and logs.
    fn name(&self) -> &str;

    /// Handles a single event.
    async fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}
