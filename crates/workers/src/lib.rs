//! Demo worker adapters.
//!
//! Thin per-domain workers (inventory, payment, shipping, notification)
//! that read state, decide an action, and issue commands — always through
//! the [`pipeline::Coordinator`], never against the store directly. They
//! model the reactive order chain: `ORDER_CREATED` triggers an inventory
//! reservation, `INVENTORY_CHECKED` a payment capture, and so on, with
//! compensation on `ORDER_FAILED` handled by the worker that owns the
//! resource.

pub mod commands;
pub mod inventory;
pub mod notification;
pub mod payment;
pub mod shipping;

pub use commands::{
    CancelOrder, CapturePayment, CompleteOrder, CreateOrder, FailOrder, OrderLine,
    ReserveInventory, ShipOrder,
};
pub use inventory::InventoryWorker;
pub use notification::NotificationWorker;
pub use payment::PaymentWorker;
pub use shipping::ShippingWorker;
