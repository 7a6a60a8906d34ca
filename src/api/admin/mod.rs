//! Admin API Module
//!
//! 整组路由叠加 `require_admin` 中间件。
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/admin/orders/{id}/status | POST | 推进订单状态 |
//! | /api/admin/cancellation-requests | GET | 待审批取消队列 |
//! | /api/admin/cancellation-requests/{id}/resolve | POST | 审批取消申请 |

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::require_admin;
use crate::core::ServerState;

/// Admin router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/admin", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/orders/{id}/status", post(handler::update_order_status))
        .route(
            "/cancellation-requests",
            get(handler::list_cancellation_requests),
        )
        .route(
            "/cancellation-requests/{id}/resolve",
            post(handler::resolve_cancellation_request),
        )
        .layer(middleware::from_fn(require_admin))
}
