//! Notification worker: a wildcard subscriber keeping a human-readable
//! trail of everything that happened.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use common::EventKind;
use event_bus::{EventHandler, HandlerError, SubscriptionId, Topic};
use event_log::Event;
use pipeline::Coordinator;

/// Worker that records a notification line per published event.
pub struct NotificationWorker {
    coordinator: Arc<Coordinator>,
    notifications: Mutex<Vec<String>>,
}

impl NotificationWorker {
    /// Creates a notification worker.
    pub fn new(coordinator: Arc<Coordinator>) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            notifications: Mutex::new(Vec::new()),
        })
    }

    /// Subscribes this worker to every event.
    pub fn attach(self: &Arc<Self>) -> SubscriptionId {
        self.coordinator
            .subscribe(Topic::All, Arc::clone(self) as Arc<dyn EventHandler>)
    }

    /// Returns all recorded notifications, oldest first.
    pub fn notifications(&self) -> Vec<String> {
        self.notifications.lock().unwrap().clone()
    }

    fn message_for(event: &Event) -> String {
        let id = &event.aggregate_id;
        match event.kind.as_str() {
            EventKind::ORDER_CREATED => format!("order {id} created"),
            EventKind::INVENTORY_CHECKED => format!("inventory reserved for order {id}"),
            EventKind::PAYMENT_PROCESSED => format!("payment captured for order {id}"),
            EventKind::ORDER_SHIPPED => format!("order {id} shipped"),
            EventKind::ORDER_COMPLETED => format!("order {id} completed"),
            EventKind::ORDER_FAILED => format!("order {id} failed"),
            EventKind::ORDER_CANCELLED => format!("order {id} cancelled"),
            EventKind::STATE_RESTORED => format!("order {id} restored to a prior state"),
            other => format!("order {id}: {other}"),
        }
    }
}

#[async_trait]
impl EventHandler for NotificationWorker {
    fn name(&self) -> &str {
        "notification-worker"
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let message = Self::message_for(event);
        self.notifications.lock().unwrap().push(message);
        Ok(())
    }
}
