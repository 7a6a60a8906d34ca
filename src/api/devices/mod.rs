//! Device API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/devices | POST | 注册/刷新 FCM 令牌 |
//! | /api/devices | DELETE | 注销当前用户的所有令牌 (登出) |

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

/// Device router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/devices", routes())
}

fn routes() -> Router<ServerState> {
    Router::new().route("/", post(handler::register).delete(handler::unregister))
}
