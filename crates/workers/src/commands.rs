//! Order commands.
//!
//! Each command enforces the order status machine in `apply` and records
//! its domain references (reservation id, payment id, tracking number) in
//! the aggregate payload.

use serde::{Deserialize, Serialize};

use aggregate_store::{AggregateState, OrderStatus, ValidationError};
use common::{AggregateId, EventKind, Version};
use pipeline::Command;

/// One line of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    /// Stock-keeping unit.
    pub sku: String,

    /// Product name for display.
    pub name: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Unit price in cents.
    pub unit_price_cents: i64,
}

impl OrderLine {
    /// Creates an order line.
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        unit_price_cents: i64,
    ) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            quantity,
            unit_price_cents,
        }
    }

    /// Total price of this line in cents.
    pub fn total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity as i64
    }
}

/// Command to create a new order (insert-only).
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The order ID to create.
    pub order_id: AggregateId,

    /// The customer placing the order.
    pub customer_id: String,

    /// Lines in the order.
    pub items: Vec<OrderLine>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(
        order_id: AggregateId,
        customer_id: impl Into<String>,
        items: Vec<OrderLine>,
    ) -> Self {
        Self {
            order_id,
            customer_id: customer_id.into(),
            items,
        }
    }
}

impl Command for CreateOrder {
    fn aggregate_id(&self) -> &AggregateId {
        &self.order_id
    }

    fn expected_version(&self) -> Option<Version> {
        None
    }

    fn kind(&self) -> EventKind {
        EventKind::order_created()
    }

    fn apply(&self, state: &AggregateState) -> Result<AggregateState, ValidationError> {
        for line in &self.items {
            if line.quantity == 0 {
                return Err(ValidationError::new(format!(
                    "invalid quantity 0 for {}",
                    line.sku
                )));
            }
            if line.unit_price_cents <= 0 {
                return Err(ValidationError::new(format!(
                    "invalid price {} for {}",
                    line.unit_price_cents, line.sku
                )));
            }
        }

        let total: i64 = self.items.iter().map(OrderLine::total_cents).sum();
        Ok(state
            .clone()
            .with_status(OrderStatus::Created)
            .with_field("customer_id", serde_json::json!(self.customer_id))
            .with_field("items", serde_json::json!(self.items))
            .with_field("total_cents", serde_json::json!(total)))
    }
}

/// Command to mark inventory as reserved for an order.
#[derive(Debug, Clone)]
pub struct ReserveInventory {
    /// The order to reserve for.
    pub order_id: AggregateId,

    /// The version the issuer observed.
    pub expected_version: Version,

    /// Reservation reference from the inventory worker.
    pub reservation_id: String,
}

impl ReserveInventory {
    /// Creates a new ReserveInventory command.
    pub fn new(
        order_id: AggregateId,
        expected_version: Version,
        reservation_id: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            expected_version,
            reservation_id: reservation_id.into(),
        }
    }
}

impl Command for ReserveInventory {
    fn aggregate_id(&self) -> &AggregateId {
        &self.order_id
    }

    fn expected_version(&self) -> Option<Version> {
        Some(self.expected_version)
    }

    fn kind(&self) -> EventKind {
        EventKind::inventory_checked()
    }

    fn apply(&self, state: &AggregateState) -> Result<AggregateState, ValidationError> {
        if !state.status.can_reserve() {
            return Err(ValidationError::new(format!(
                "cannot reserve inventory in {} status",
                state.status
            )));
        }
        Ok(state
            .clone()
            .with_status(OrderStatus::InventoryReserved)
            .with_field("reservation_id", serde_json::json!(self.reservation_id)))
    }
}

/// Command to record a captured payment.
#[derive(Debug, Clone)]
pub struct CapturePayment {
    /// The order the payment belongs to.
    pub order_id: AggregateId,

    /// The version the issuer observed.
    pub expected_version: Version,

    /// Payment reference from the payment worker.
    pub payment_id: String,
}

impl CapturePayment {
    /// Creates a new CapturePayment command.
    pub fn new(
        order_id: AggregateId,
        expected_version: Version,
        payment_id: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            expected_version,
            payment_id: payment_id.into(),
        }
    }
}

impl Command for CapturePayment {
    fn aggregate_id(&self) -> &AggregateId {
        &self.order_id
    }

    fn expected_version(&self) -> Option<Version> {
        Some(self.expected_version)
    }

    fn kind(&self) -> EventKind {
        EventKind::payment_processed()
    }

    fn apply(&self, state: &AggregateState) -> Result<AggregateState, ValidationError> {
        if !state.status.can_capture() {
            return Err(ValidationError::new(format!(
                "cannot capture payment in {} status",
                state.status
            )));
        }
        Ok(state
            .clone()
            .with_status(OrderStatus::PaymentCaptured)
            .with_field("payment_id", serde_json::json!(self.payment_id)))
    }
}

/// Command to hand an order to the carrier.
#[derive(Debug, Clone)]
pub struct ShipOrder {
    /// The order to ship.
    pub order_id: AggregateId,

    /// The version the issuer observed.
    pub expected_version: Version,

    /// Shipment tracking number.
    pub tracking_number: String,
}

impl ShipOrder {
    /// Creates a new ShipOrder command.
    pub fn new(
        order_id: AggregateId,
        expected_version: Version,
        tracking_number: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            expected_version,
            tracking_number: tracking_number.into(),
        }
    }
}

impl Command for ShipOrder {
    fn aggregate_id(&self) -> &AggregateId {
        &self.order_id
    }

    fn expected_version(&self) -> Option<Version> {
        Some(self.expected_version)
    }

    fn kind(&self) -> EventKind {
        EventKind::order_shipped()
    }

    fn apply(&self, state: &AggregateState) -> Result<AggregateState, ValidationError> {
        if !state.status.can_ship() {
            return Err(ValidationError::new(format!(
                "cannot ship in {} status",
                state.status
            )));
        }
        Ok(state
            .clone()
            .with_status(OrderStatus::Shipped)
            .with_field("tracking_number", serde_json::json!(self.tracking_number)))
    }
}

/// Command to close out a shipped order.
#[derive(Debug, Clone)]
pub struct CompleteOrder {
    /// The order to complete.
    pub order_id: AggregateId,

    /// The version the issuer observed.
    pub expected_version: Version,
}

impl CompleteOrder {
    /// Creates a new CompleteOrder command.
    pub fn new(order_id: AggregateId, expected_version: Version) -> Self {
        Self {
            order_id,
            expected_version,
        }
    }
}

impl Command for CompleteOrder {
    fn aggregate_id(&self) -> &AggregateId {
        &self.order_id
    }

    fn expected_version(&self) -> Option<Version> {
        Some(self.expected_version)
    }

    fn kind(&self) -> EventKind {
        EventKind::order_completed()
    }

    fn apply(&self, state: &AggregateState) -> Result<AggregateState, ValidationError> {
        if !state.status.can_complete() {
            return Err(ValidationError::new(format!(
                "cannot complete in {} status",
                state.status
            )));
        }
        Ok(state.clone().with_status(OrderStatus::Completed))
    }
}

/// Command to mark an order failed.
///
/// Workers subscribed to `ORDER_FAILED` run their own compensation.
#[derive(Debug, Clone)]
pub struct FailOrder {
    /// The order to fail.
    pub order_id: AggregateId,

    /// The version the issuer observed.
    pub expected_version: Version,

    /// Why the order failed.
    pub reason: String,
}

impl FailOrder {
    /// Creates a new FailOrder command.
    pub fn new(order_id: AggregateId, expected_version: Version, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            expected_version,
            reason: reason.into(),
        }
    }
}

impl Command for FailOrder {
    fn aggregate_id(&self) -> &AggregateId {
        &self.order_id
    }

    fn expected_version(&self) -> Option<Version> {
        Some(self.expected_version)
    }

    fn kind(&self) -> EventKind {
        EventKind::order_failed()
    }

    fn apply(&self, state: &AggregateState) -> Result<AggregateState, ValidationError> {
        if !state.status.can_fail() {
            return Err(ValidationError::new(format!(
                "cannot fail in terminal {} status",
                state.status
            )));
        }
        Ok(state
            .clone()
            .with_status(OrderStatus::Failed)
            .with_field("failure_reason", serde_json::json!(self.reason)))
    }
}

/// Command to cancel an order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    /// The order to cancel.
    pub order_id: AggregateId,

    /// The version the issuer observed.
    pub expected_version: Version,

    /// Reason for cancellation.
    pub reason: String,
}

impl CancelOrder {
    /// Creates a new CancelOrder command.
    pub fn new(order_id: AggregateId, expected_version: Version, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            expected_version,
            reason: reason.into(),
        }
    }
}

impl Command for CancelOrder {
    fn aggregate_id(&self) -> &AggregateId {
        &self.order_id
    }

    fn expected_version(&self) -> Option<Version> {
        Some(self.expected_version)
    }

    fn kind(&self) -> EventKind {
        EventKind::order_cancelled()
    }

    fn apply(&self, state: &AggregateState) -> Result<AggregateState, ValidationError> {
        if !state.status.can_cancel() {
            return Err(ValidationError::new(format!(
                "cannot cancel in {} status",
                state.status
            )));
        }
        Ok(state
            .clone()
            .with_status(OrderStatus::Cancelled)
            .with_field("cancellation_reason", serde_json::json!(self.reason)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_state() -> AggregateState {
        CreateOrder::new(
            AggregateId::new("ORD-1"),
            "CUST-1",
            vec![OrderLine::new("SKU-001", "Widget", 2, 1000)],
        )
        .apply(&AggregateState::default())
        .unwrap()
    }

    #[test]
    fn create_computes_total() {
        let state = CreateOrder::new(
            AggregateId::new("ORD-1"),
            "CUST-1",
            vec![
                OrderLine::new("SKU-001", "Widget", 2, 1000),
                OrderLine::new("SKU-002", "Gadget", 1, 2500),
            ],
        )
        .apply(&AggregateState::default())
        .unwrap();

        assert_eq!(state.status, OrderStatus::Created);
        assert_eq!(state.field("total_cents"), Some(&serde_json::json!(4500)));
        assert_eq!(state.field("customer_id"), Some(&serde_json::json!("CUST-1")));
    }

    #[test]
    fn create_rejects_zero_quantity() {
        let result = CreateOrder::new(
            AggregateId::new("ORD-1"),
            "CUST-1",
            vec![OrderLine::new("SKU-001", "Widget", 0, 1000)],
        )
        .apply(&AggregateState::default());

        assert!(result.is_err());
    }

    #[test]
    fn create_rejects_non_positive_price() {
        let result = CreateOrder::new(
            AggregateId::new("ORD-1"),
            "CUST-1",
            vec![OrderLine::new("SKU-001", "Widget", 1, 0)],
        )
        .apply(&AggregateState::default());

        assert!(result.is_err());
    }

    #[test]
    fn reserve_from_created_sets_reference() {
        let cmd = ReserveInventory::new(AggregateId::new("ORD-1"), Version::first(), "RES-0001");
        let state = cmd.apply(&created_state()).unwrap();

        assert_eq!(state.status, OrderStatus::InventoryReserved);
        assert_eq!(state.field("reservation_id"), Some(&serde_json::json!("RES-0001")));
    }

    #[test]
    fn reserve_twice_is_rejected() {
        let cmd = ReserveInventory::new(AggregateId::new("ORD-1"), Version::first(), "RES-0001");
        let reserved = cmd.apply(&created_state()).unwrap();
        assert!(cmd.apply(&reserved).is_err());
    }

    #[test]
    fn full_lifecycle_applies_in_order() {
        let id = AggregateId::new("ORD-1");
        let state = created_state();

        let state = ReserveInventory::new(id.clone(), Version::first(), "RES-0001")
            .apply(&state)
            .unwrap();
        let state = CapturePayment::new(id.clone(), Version::new(2), "PAY-0001")
            .apply(&state)
            .unwrap();
        let state = ShipOrder::new(id.clone(), Version::new(3), "TRACK-0001")
            .apply(&state)
            .unwrap();
        let state = CompleteOrder::new(id.clone(), Version::new(4)).apply(&state).unwrap();

        assert_eq!(state.status, OrderStatus::Completed);
        assert_eq!(state.field("payment_id"), Some(&serde_json::json!("PAY-0001")));
        assert_eq!(
            state.field("tracking_number"),
            Some(&serde_json::json!("TRACK-0001"))
        );
    }

    #[test]
    fn capture_before_reserve_is_rejected() {
        let cmd = CapturePayment::new(AggregateId::new("ORD-1"), Version::first(), "PAY-0001");
        assert!(cmd.apply(&created_state()).is_err());
    }

    #[test]
    fn fail_is_rejected_in_terminal_status() {
        let id = AggregateId::new("ORD-1");
        let cancelled = CancelOrder::new(id.clone(), Version::first(), "changed mind")
            .apply(&created_state())
            .unwrap();

        let result = FailOrder::new(id, Version::new(2), "too late").apply(&cancelled);
        assert!(result.is_err());
    }

    #[test]
    fn cancel_after_shipping_is_rejected() {
        let id = AggregateId::new("ORD-1");
        let state = created_state();
        let state = ReserveInventory::new(id.clone(), Version::first(), "RES-0001")
            .apply(&state)
            .unwrap();
        let state = CapturePayment::new(id.clone(), Version::new(2), "PAY-0001")
            .apply(&state)
            .unwrap();
        let state = ShipOrder::new(id.clone(), Version::new(3), "TRACK-0001")
            .apply(&state)
            .unwrap();

        let result = CancelOrder::new(id, Version::new(4), "too late").apply(&state);
        assert!(result.is_err());
    }
}
