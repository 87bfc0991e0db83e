//! Payment worker: captures payment once inventory is reserved.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use common::EventKind;
use event_bus::{EventHandler, HandlerError, SubscriptionId};
use event_log::Event;
use pipeline::Coordinator;

use crate::commands::{CapturePayment, FailOrder};

#[derive(Debug, Default)]
struct PaymentBook {
    // payment id → (order id, amount in cents)
    payments: HashMap<String, (String, i64)>,
    next_id: u32,
}

/// Worker that charges the customer.
///
/// Reacts to `INVENTORY_CHECKED` with a `CapturePayment` command, or a
/// `FailOrder` when the charge is declined (test hook). Reacts to
/// `ORDER_FAILED` by refunding any payment it captured for that order.
pub struct PaymentWorker {
    coordinator: Arc<Coordinator>,
    book: Mutex<PaymentBook>,
    fail_on_capture: AtomicBool,
}

impl PaymentWorker {
    /// Creates a payment worker.
    pub fn new(coordinator: Arc<Coordinator>) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            book: Mutex::new(PaymentBook::default()),
            fail_on_capture: AtomicBool::new(false),
        })
    }

    /// Subscribes this worker to the events it reacts to.
    pub fn attach(self: &Arc<Self>) -> Vec<SubscriptionId> {
        let handler: Arc<dyn EventHandler> = Arc::clone(self) as Arc<dyn EventHandler>;
        vec![
            self.coordinator
                .subscribe(EventKind::inventory_checked(), Arc::clone(&handler)),
            self.coordinator
                .subscribe(EventKind::order_failed(), handler),
        ]
    }

    /// Makes every subsequent capture attempt decline.
    pub fn set_fail_on_capture(&self, fail: bool) {
        self.fail_on_capture.store(fail, Ordering::SeqCst);
    }

    /// Number of captured payments.
    pub fn payment_count(&self) -> usize {
        self.book.lock().unwrap().payments.len()
    }

    /// The amount captured for an order, if any.
    pub fn captured_amount(&self, order_id: &str) -> Option<i64> {
        let book = self.book.lock().unwrap();
        book.payments
            .values()
            .find(|(order, _)| order == order_id)
            .map(|(_, amount)| *amount)
    }
}

#[async_trait]
impl EventHandler for PaymentWorker {
    fn name(&self) -> &str {
        "payment-worker"
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        match event.kind.as_str() {
            EventKind::INVENTORY_CHECKED => {}
            EventKind::ORDER_FAILED => {
                let mut book = self.book.lock().unwrap();
                let refunded: Vec<String> = book
                    .payments
                    .iter()
                    .filter(|(_, (order, _))| order == event.aggregate_id.as_str())
                    .map(|(payment_id, _)| payment_id.clone())
                    .collect();
                for payment_id in refunded {
                    book.payments.remove(&payment_id);
                    tracing::info!(
                        aggregate_id = %event.aggregate_id,
                        payment_id,
                        "payment refunded after order failure"
                    );
                }
                return Ok(());
            }
            _ => return Ok(()),
        }

        if self.fail_on_capture.load(Ordering::SeqCst) {
            self.coordinator
                .submit(&FailOrder::new(
                    event.aggregate_id.clone(),
                    event.caused_by_version,
                    "payment declined",
                ))
                .await
                .map_err(|e| HandlerError::new(e.to_string()))?;
            return Ok(());
        }

        let amount = event
            .payload
            .get("fields")
            .and_then(|fields| fields.get("total_cents"))
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| HandlerError::new("event payload has no total_cents"))?;

        let payment_id = {
            let mut book = self.book.lock().unwrap();
            book.next_id += 1;
            let payment_id = format!("PAY-{:04}", book.next_id);
            book.payments
                .insert(payment_id.clone(), (event.aggregate_id.to_string(), amount));
            payment_id
        };

        self.coordinator
            .submit(&CapturePayment::new(
                event.aggregate_id.clone(),
                event.caused_by_version,
                payment_id,
            ))
            .await
            .map_err(|e| HandlerError::new(e.to_string()))?;
        Ok(())
    }
}
