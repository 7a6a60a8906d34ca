//! Cancellation Request Model
//!
//! 生产/配送阶段的客户取消需要管理员审批，此表是审批队列。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CancellationStatus {
    Pending,
    Approved,
    Rejected,
}

/// Admin-approval ticket for cancelling an order in production states
///
/// Invariant: the transition to `approved` cancels the order and restores
/// inventory exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CancellationRequest {
    pub id: i64,
    pub order_id: i64,
    pub user_id: i64,
    pub reason: String,
    pub status: CancellationStatus,
    pub admin_notes: Option<String>,
    /// Admin who processed the request
    pub processed_by: Option<i64>,
    pub created_at: i64,
    pub processed_at: Option<i64>,
}
