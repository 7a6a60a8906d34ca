//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{CancellationRequest, Order, OrderItem, PaymentMethod};
use crate::db::repository::order as order_repo;
use crate::orders::CancelOutcome;
use crate::orders::placement::PlaceOrderRequest;
use crate::utils::{AppError, AppResponse, AppResult, ok, ok_with_message};

/// Query params for listing orders
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Serialize)]
pub struct PlaceResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// KNET 跳转地址 (仅 knet 订单且会话开启成功时)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_redirect_url: Option<String>,
}

#[derive(Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub reason: String,
}

/// 取消结果：立即取消或进入审批队列
#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelResponse {
    Cancelled { order: Order },
    PendingApproval { request: CancellationRequest },
}

/// Place an order. KNET orders also get a gateway session opened; if that
/// fails the order still stands and the app retries via
/// `/api/payments/initiate`.
pub async fn place(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<PlaceOrderRequest>,
) -> AppResult<(StatusCode, Json<AppResponse<PlaceResponse>>)> {
    let method = payload.payment_method;
    let placed = state.placement_service().place(user.id, payload).await?;

    let payment_redirect_url = if method == PaymentMethod::Knet {
        match state
            .payment_coordinator()
            .initiate(user.id, placed.order.id)
            .await
        {
            Ok(payment) => payment.redirect_url,
            Err(e) => {
                tracing::warn!(
                    order_id = placed.order.id,
                    error = %e,
                    "Payment initiation after placement failed"
                );
                None
            }
        }
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        ok(PlaceResponse {
            order: placed.order,
            items: placed.items,
            payment_redirect_url,
        }),
    ))
}

/// List my orders, most recent first
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<AppResponse<Vec<Order>>>> {
    let limit = query.limit.clamp(1, 100);
    let orders = order_repo::list_by_user(&state.pool, user.id, limit, query.offset.max(0)).await?;
    Ok(ok(orders))
}

/// Order detail with line items
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<AppResponse<OrderDetail>>> {
    let order = order_repo::find_by_id(&state.pool, id)
        .await?
        .filter(|o| o.user_id == user.id || user.is_admin())
        .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    let items = order_repo::list_items(&state.pool, id).await?;
    Ok(ok(OrderDetail { order, items }))
}

/// Request cancellation
pub async fn cancel(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<CancelBody>,
) -> AppResult<(StatusCode, Json<AppResponse<CancelResponse>>)> {
    let outcome = state
        .cancellation_service()
        .request_cancel(user.id, id, &body.reason)
        .await?;

    // Immediate cancellation answers 200; a queued ticket answers 202
    let (status, response, message) = match outcome {
        CancelOutcome::Cancelled(order) => (
            StatusCode::OK,
            CancelResponse::Cancelled { order },
            "Order cancelled",
        ),
        CancelOutcome::PendingApproval(request) => (
            StatusCode::ACCEPTED,
            CancelResponse::PendingApproval { request },
            "Cancellation pending admin approval",
        ),
    };
    Ok((status, ok_with_message(response, message)))
}
