//! Database Models

// Devices
pub mod device;

// Catalog & inventory
pub mod design;
pub mod fabric;
pub mod settings;

// Orders
pub mod cancellation;
pub mod coupon;
pub mod order;

// Payments
pub mod payment;

// Notifications
pub mod notification;

// Re-exports
pub use cancellation::{CancellationRequest, CancellationStatus};
pub use coupon::{Coupon, CouponIneligibleReason, CouponKind};
pub use design::UserDesign;
pub use device::Device;
pub use fabric::{FabricColor, InventoryTransaction, InventoryTxKind};
pub use notification::NotificationLog;
pub use order::{
    CancelledBy, Order, OrderCreate, OrderItem, OrderItemCreate, OrderStatus, PaymentMethod,
};
pub use payment::{Payment, PaymentStatus};
pub use settings::DeliverySettings;
