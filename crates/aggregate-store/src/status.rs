//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Created ──► InventoryReserved ──► PaymentCaptured ──► Shipped ──► Completed
///    │               │                     │               │
///    └───────────────┴─────────────────────┴───────────────┴──► Failed / Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order exists, nothing has been done to it yet.
    #[default]
    Created,

    /// Inventory has been checked and reserved.
    InventoryReserved,

    /// Payment has been captured.
    PaymentCaptured,

    /// Order has been handed to the carrier.
    Shipped,

    /// Order delivered and closed (terminal).
    Completed,

    /// A processing step failed; compensation may follow (terminal).
    Failed,

    /// Order was cancelled (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if inventory can be reserved in this status.
    pub fn can_reserve(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    /// Returns true if payment can be captured in this status.
    pub fn can_capture(&self) -> bool {
        matches!(self, OrderStatus::InventoryReserved)
    }

    /// Returns true if the order can be shipped in this status.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::PaymentCaptured)
    }

    /// Returns true if the order can be completed in this status.
    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    /// Returns true if the order can be marked failed in this status.
    pub fn can_fail(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Created | OrderStatus::InventoryReserved | OrderStatus::PaymentCaptured
        )
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    /// Returns the status name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::InventoryReserved => "INVENTORY_RESERVED",
            OrderStatus::PaymentCaptured => "PAYMENT_CAPTURED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
