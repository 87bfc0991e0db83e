//! Inventory worker: reserves stock for new orders, releases it when an
//! order fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use common::EventKind;
use event_bus::{EventHandler, HandlerError, SubscriptionId};
use event_log::Event;
use pipeline::Coordinator;

use crate::commands::{FailOrder, OrderLine, ReserveInventory};

#[derive(Debug, Default)]
struct InventoryBook {
    stock: HashMap<String, u32>,
    // Reserved lines per order id, so a failed order can be released.
    reservations: HashMap<String, (String, Vec<OrderLine>)>,
    next_id: u32,
}

/// Worker that owns the stock table.
///
/// Reacts to `ORDER_CREATED` by checking and reserving stock, issuing
/// either a `ReserveInventory` or a `FailOrder` command; reacts to
/// `ORDER_FAILED` by returning any reserved stock (compensation).
pub struct InventoryWorker {
    coordinator: Arc<Coordinator>,
    book: Mutex<InventoryBook>,
}

impl InventoryWorker {
    /// Creates a worker with the given initial stock (sku → quantity).
    pub fn new(coordinator: Arc<Coordinator>, initial_stock: HashMap<String, u32>) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            book: Mutex::new(InventoryBook {
                stock: initial_stock,
                ..InventoryBook::default()
            }),
        })
    }

    /// Subscribes this worker to the events it reacts to.
    pub fn attach(self: &Arc<Self>) -> Vec<SubscriptionId> {
        let handler: Arc<dyn EventHandler> = Arc::clone(self) as Arc<dyn EventHandler>;
        vec![
            self.coordinator
                .subscribe(EventKind::order_created(), Arc::clone(&handler)),
            self.coordinator
                .subscribe(EventKind::order_failed(), handler),
        ]
    }

    /// Current stock for a SKU.
    pub fn stock_of(&self, sku: &str) -> u32 {
        self.book.lock().unwrap().stock.get(sku).copied().unwrap_or(0)
    }

    /// Number of live reservations.
    pub fn reservation_count(&self) -> usize {
        self.book.lock().unwrap().reservations.len()
    }

    async fn handle_order_created(&self, event: &Event) -> Result<(), HandlerError> {
        let items = order_lines(event)?;

        // Decide and reserve under the lock, submit after releasing it.
        let decision = {
            let mut book = self.book.lock().unwrap();
            let shortage = items.iter().find(|line| {
                book.stock.get(&line.sku).copied().unwrap_or(0) < line.quantity
            });

            match shortage {
                Some(line) => Err(format!("insufficient stock for {}", line.sku)),
                None => {
                    for line in &items {
                        *book.stock.get_mut(&line.sku).expect("checked above") -= line.quantity;
                    }
                    book.next_id += 1;
                    let reservation_id = format!("RES-{:04}", book.next_id);
                    book.reservations.insert(
                        event.aggregate_id.to_string(),
                        (reservation_id.clone(), items.clone()),
                    );
                    Ok(reservation_id)
                }
            }
        };

        match decision {
            Ok(reservation_id) => {
                self.coordinator
                    .submit(&ReserveInventory::new(
                        event.aggregate_id.clone(),
                        event.caused_by_version,
                        reservation_id,
                    ))
                    .await
                    .map_err(|e| HandlerError::new(e.to_string()))?;
            }
            Err(reason) => {
                self.coordinator
                    .submit(&FailOrder::new(
                        event.aggregate_id.clone(),
                        event.caused_by_version,
                        reason,
                    ))
                    .await
                    .map_err(|e| HandlerError::new(e.to_string()))?;
            }
        }
        Ok(())
    }

    fn handle_order_failed(&self, event: &Event) {
        let mut book = self.book.lock().unwrap();
        if let Some((reservation_id, items)) =
            book.reservations.remove(event.aggregate_id.as_str())
        {
            for line in &items {
                *book.stock.entry(line.sku.clone()).or_insert(0) += line.quantity;
            }
            tracing::info!(
                aggregate_id = %event.aggregate_id,
                reservation_id,
                "reservation released after order failure"
            );
        }
    }
}

#[async_trait]
impl EventHandler for InventoryWorker {
    fn name(&self) -> &str {
        "inventory-worker"
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        match event.kind.as_str() {
            EventKind::ORDER_CREATED => self.handle_order_created(event).await,
            EventKind::ORDER_FAILED => {
                self.handle_order_failed(event);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Extracts the order lines from an event's state payload.
fn order_lines(event: &Event) -> Result<Vec<OrderLine>, HandlerError> {
    let items = event
        .payload
        .get("fields")
        .and_then(|fields| fields.get("items"))
        .cloned()
        .ok_or_else(|| HandlerError::new("event payload has no items"))?;
    serde_json::from_value(items).map_err(|e| HandlerError::new(e.to_string()))
}
