//! Customer Cancellation
//!
//! 取消路径按订单阶段分流：
//! - `pending` / `confirmed`：立即取消并回补库存
//! - `working` / `shipping`：进入管理员审批队列
//! - `delivered` / `cancelled`：拒绝
//!
//! 审批通过 = 状态机转换 + 工单标记，两者都带 exactly-once 保护。

use sqlx::SqlitePool;

use crate::db::models::{CancellationRequest, CancellationStatus, CancelledBy, Order, OrderStatus};
use crate::db::repository::{cancellation as cancellation_repo, order as order_repo};
use crate::orders::state_machine::{Actor, OrderStateMachine};
use crate::utils::{AppError, AppResult};

/// What a cancellation attempt produced
#[derive(Debug)]
pub enum CancelOutcome {
    /// Cancelled on the spot; inventory restored
    Cancelled(Order),
    /// In production or out for delivery; an admin has to approve
    PendingApproval(CancellationRequest),
}

#[derive(Clone)]
pub struct CancellationService {
    pool: SqlitePool,
    machine: OrderStateMachine,
}

impl CancellationService {
    pub fn new(pool: SqlitePool, machine: OrderStateMachine) -> Self {
        Self { pool, machine }
    }

    /// Customer asks to cancel their order.
    ///
    /// Re-posting while a ticket is already open returns the existing
    /// ticket instead of stacking duplicates.
    pub async fn request_cancel(
        &self,
        user_id: i64,
        order_id: i64,
        reason: &str,
    ) -> AppResult<CancelOutcome> {
        let order = order_repo::find_by_id(&self.pool, order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        match order.status {
            OrderStatus::Pending | OrderStatus::Confirmed => {
                let order = self
                    .machine
                    .transition(
                        order_id,
                        OrderStatus::Cancelled,
                        Actor::Customer,
                        Some(CancelledBy::User),
                        Some(reason),
                    )
                    .await?;
                Ok(CancelOutcome::Cancelled(order))
            }
            OrderStatus::Working | OrderStatus::Shipping => {
                if let Some(existing) =
                    cancellation_repo::find_pending_by_order(&self.pool, order_id).await?
                {
                    return Ok(CancelOutcome::PendingApproval(existing));
                }
                let request =
                    cancellation_repo::insert(&self.pool, order_id, user_id, reason).await?;
                tracing::info!(order_id, request_id = request.id, "Cancellation queued for approval");
                Ok(CancelOutcome::PendingApproval(request))
            }
            OrderStatus::Delivered | OrderStatus::Cancelled => Err(AppError::IllegalTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            }),
        }
    }

    /// Admin approves or rejects a pending ticket.
    ///
    /// Approval drives the order through the state machine first; a
    /// concurrent second approval loses there (the order is already
    /// terminal) and the ticket stays consistent.
    pub async fn resolve(
        &self,
        admin_id: i64,
        request_id: i64,
        approve: bool,
        admin_notes: Option<&str>,
    ) -> AppResult<CancellationRequest> {
        let request = cancellation_repo::find_by_id(&self.pool, request_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Cancellation request {request_id} not found"))
            })?;
        if request.status != CancellationStatus::Pending {
            return Err(AppError::conflict(format!(
                "Cancellation request {request_id} already processed"
            )));
        }

        if approve {
            self.machine
                .transition(
                    request.order_id,
                    OrderStatus::Cancelled,
                    Actor::Admin,
                    Some(CancelledBy::User),
                    Some(request.reason.as_str()),
                )
                .await?;
        }

        let status = if approve {
            CancellationStatus::Approved
        } else {
            CancellationStatus::Rejected
        };
        let updated =
            cancellation_repo::resolve(&self.pool, request_id, status, admin_notes, admin_id)
                .await?;
        if !updated {
            return Err(AppError::conflict(format!(
                "Cancellation request {request_id} already processed"
            )));
        }

        cancellation_repo::find_by_id(&self.pool, request_id)
            .await?
            .ok_or_else(|| AppError::internal("Cancellation request vanished after resolve"))
    }
}
