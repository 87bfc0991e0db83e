//! Shipping worker: ships paid orders and completes shipped ones.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use common::EventKind;
use event_bus::{EventHandler, HandlerError, SubscriptionId};
use event_log::Event;
use pipeline::Coordinator;

use crate::commands::{CompleteOrder, ShipOrder};

#[derive(Debug, Default)]
struct ShippingBook {
    // tracking number → order id
    shipments: HashMap<String, String>,
    next_id: u32,
}

/// Worker that hands orders to the carrier.
///
/// Reacts to `PAYMENT_PROCESSED` with a `ShipOrder` command, then to its
/// own `ORDER_SHIPPED` event with a `CompleteOrder` — a two-step cascade
/// that resolves depth-first within the original publish.
pub struct ShippingWorker {
    coordinator: Arc<Coordinator>,
    book: Mutex<ShippingBook>,
}

impl ShippingWorker {
    /// Creates a shipping worker.
    pub fn new(coordinator: Arc<Coordinator>) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            book: Mutex::new(ShippingBook::default()),
        })
    }

    /// Subscribes this worker to the events it reacts to.
    pub fn attach(self: &Arc<Self>) -> Vec<SubscriptionId> {
        let handler: Arc<dyn EventHandler> = Arc::clone(self) as Arc<dyn EventHandler>;
        vec![
            self.coordinator
                .subscribe(EventKind::payment_processed(), Arc::clone(&handler)),
            self.coordinator
                .subscribe(EventKind::order_shipped(), handler),
        ]
    }

    /// Number of shipments created.
    pub fn shipment_count(&self) -> usize {
        self.book.lock().unwrap().shipments.len()
    }

    /// The tracking number assigned to an order, if shipped.
    pub fn tracking_number_for(&self, order_id: &str) -> Option<String> {
        let book = self.book.lock().unwrap();
        book.shipments
            .iter()
            .find(|(_, order)| order.as_str() == order_id)
            .map(|(tracking, _)| tracking.clone())
    }
}

#[async_trait]
impl EventHandler for ShippingWorker {
    fn name(&self) -> &str {
        "shipping-worker"
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        match event.kind.as_str() {
            EventKind::PAYMENT_PROCESSED => {
                let tracking_number = {
                    let mut book = self.book.lock().unwrap();
                    book.next_id += 1;
                    let tracking_number = format!("TRACK-{:04}", book.next_id);
                    book.shipments
                        .insert(tracking_number.clone(), event.aggregate_id.to_string());
                    tracking_number
                };

                self.coordinator
                    .submit(&ShipOrder::new(
                        event.aggregate_id.clone(),
                        event.caused_by_version,
                        tracking_number,
                    ))
                    .await
                    .map_err(|e| HandlerError::new(e.to_string()))?;
                Ok(())
            }
            EventKind::ORDER_SHIPPED => {
                self.coordinator
                    .submit(&CompleteOrder::new(
                        event.aggregate_id.clone(),
                        event.caused_by_version,
                    ))
                    .await
                    .map_err(|e| HandlerError::new(e.to_string()))?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
