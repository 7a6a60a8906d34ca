//! Payment API Module
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /api/payments/initiate | POST | 开启 KNET 会话 | 是 |
//! | /api/payments/callback | GET | 网关浏览器跳转 (302) | 无 |
//! | /api/payments/verify | POST | 手动核实支付 | 是 |
//! | /api/payments/{track_id} | GET | 支付详情 | 是 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Payment router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/payments", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/initiate", post(handler::initiate))
        // 网关跳转无法携带令牌；require_auth 按路径放行
        .route("/callback", get(handler::callback))
        .route("/verify", post(handler::verify))
        .route("/{track_id}", get(handler::get_by_track_id))
}
