//! Payment Model
//!
//! 一个订单同一时间最多绑定一个网关会话；`track_id` 贯穿网关往返。

use serde::{Deserialize, Serialize};

/// Settlement status — the single system-of-record for settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Captured,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gateway session bound 1:1 to an order
///
/// Invariant: `status = captured` ⇒ `verified_with_gateway` and
/// `completed_at` are set, and the bound order is at least `Confirmed`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    /// `RAGY-{13-digit ms epoch}-{6 uppercase alnum}`
    pub track_id: String,
    /// Random UUID per initiation attempt; UNIQUE guards duplicate sessions
    pub idempotency_key: String,
    pub gateway_payment_id: Option<String>,
    pub status: PaymentStatus,
    #[serde(with = "crate::utils::money::kwd")]
    pub amount_fils: i64,
    pub currency: String,
    pub success_url: String,
    pub error_url: String,
    pub redirect_url: Option<String>,
    /// Raw status string as the gateway reported it
    pub raw_gateway_status: Option<String>,
    pub reference_code: Option<String>,
    pub verification_attempts: i64,
    pub verified_with_gateway: bool,
    pub completed_at: Option<i64>,
    pub created_at: i64,
}
