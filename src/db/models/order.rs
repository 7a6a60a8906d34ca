//! Order & Order Item Models

use serde::{Deserialize, Serialize};

/// Order fulfilment status — the single system-of-record for fulfilment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Working,
    Shipping,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Column holding this status' timestamp
    pub fn timestamp_column(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending_at",
            OrderStatus::Confirmed => "confirmed_at",
            OrderStatus::Working => "working_at",
            OrderStatus::Shipping => "shipping_at",
            OrderStatus::Delivered => "delivered_at",
            OrderStatus::Cancelled => "cancelled_at",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Working => "working",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who cancelled the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CancelledBy {
    User,
    Admin,
}

/// Payment method tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Knet,
}

impl PaymentMethod {
    pub fn is_cash(self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

/// A placed purchase
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    /// `INV-YYYYMMDD-NNNN`
    pub invoice_number: String,
    pub user_id: i64,

    // Address snapshot (denormalized at placement; later edits to the
    // user's address must not rewrite history)
    pub address_area: String,
    pub address_block: Option<String>,
    pub address_street: Option<String>,
    pub address_house: Option<String>,
    pub address_notes: Option<String>,
    pub contact_name: String,
    pub contact_phone: String,

    #[serde(with = "crate::utils::money::kwd")]
    pub total_price_fils: i64,
    #[serde(with = "crate::utils::money::kwd")]
    pub delivery_fee_fils: i64,
    #[serde(with = "crate::utils::money::kwd")]
    pub discount_fils: i64,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,

    pub status: OrderStatus,
    pub pending_at: Option<i64>,
    pub confirmed_at: Option<i64>,
    pub working_at: Option<i64>,
    pub shipping_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    pub created_at: i64,
}

impl Order {
    /// Timestamp recorded for the given status, if visited
    pub fn status_timestamp(&self, status: OrderStatus) -> Option<i64> {
        match status {
            OrderStatus::Pending => self.pending_at,
            OrderStatus::Confirmed => self.confirmed_at,
            OrderStatus::Working => self.working_at,
            OrderStatus::Shipping => self.shipping_at,
            OrderStatus::Delivered => self.delivered_at,
            OrderStatus::Cancelled => self.cancelled_at,
        }
    }
}

/// Insert payload for a new order (always starts `Pending`)
#[derive(Debug, Clone)]
pub struct OrderCreate {
    pub invoice_number: String,
    pub user_id: i64,
    pub address_area: String,
    pub address_block: Option<String>,
    pub address_street: Option<String>,
    pub address_house: Option<String>,
    pub address_notes: Option<String>,
    pub contact_name: String,
    pub contact_phone: String,
    pub total_price_fils: i64,
    pub delivery_fee_fils: i64,
    pub discount_fils: i64,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
}

/// Insert payload for one order line
#[derive(Debug, Clone)]
pub struct OrderItemCreate {
    pub design_id: i64,
    pub product_name: String,
    pub size_snapshot: String,
    pub unit_price_fils: i64,
    pub quantity: i64,
    pub discount_percent: Option<i64>,
    pub net_amount_fils: i64,
    pub design_breakdown: String,
}

/// One line on an order
///
/// Invariant: `net_amount = unit_price × quantity − discount`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub design_id: i64,
    pub product_name: String,
    /// JSON: named default size or custom measurement map
    pub size_snapshot: String,
    #[serde(with = "crate::utils::money::kwd")]
    pub unit_price_fils: i64,
    pub quantity: i64,
    pub discount_percent: Option<i64>,
    #[serde(with = "crate::utils::money::kwd")]
    pub net_amount_fils: i64,
    /// JSON: denormalized per-component price breakdown
    pub design_breakdown: String,
}
