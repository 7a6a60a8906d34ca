//! Admin API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{CancellationRequest, CancelledBy, Order, OrderStatus};
use crate::db::repository::cancellation as cancellation_repo;
use crate::orders::Actor;
use crate::utils::{AppResponse, AppResult, ok, ok_with_message};

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: OrderStatus,
    /// 仅 `cancelled` 时使用
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    pub approve: bool,
    pub notes: Option<String>,
}

/// Drive an order to the given status
pub async fn update_order_status(
    State(state): State<ServerState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusBody>,
) -> AppResult<Json<AppResponse<Order>>> {
    let cancelled_by = (body.status == OrderStatus::Cancelled).then_some(CancelledBy::Admin);
    let order = state
        .state_machine()
        .transition(
            id,
            body.status,
            Actor::Admin,
            cancelled_by,
            body.reason.as_deref(),
        )
        .await?;
    Ok(ok(order))
}

/// Pending cancellation queue, oldest first
pub async fn list_cancellation_requests(
    State(state): State<ServerState>,
    _user: CurrentUser,
) -> AppResult<Json<AppResponse<Vec<CancellationRequest>>>> {
    let requests = cancellation_repo::list_pending(&state.pool).await?;
    Ok(ok(requests))
}

/// Approve or reject one cancellation request
pub async fn resolve_cancellation_request(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<ResolveBody>,
) -> AppResult<Json<AppResponse<CancellationRequest>>> {
    let request = state
        .cancellation_service()
        .resolve(user.id, id, body.approve, body.notes.as_deref())
        .await?;
    let message = if body.approve {
        "Cancellation approved"
    } else {
        "Cancellation rejected"
    };
    Ok(ok_with_message(request, message))
}
