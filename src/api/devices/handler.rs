//! Device API Handlers

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::Device;
use crate::db::repository::device as device_repo;
use crate::utils::{AppError, AppResponse, AppResult, ok, ok_with_message};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterBody {
    #[validate(length(min = 1, max = 512))]
    pub token: String,
    pub device_id: Option<String>,
    /// `android` / `ios`
    pub device_type: Option<String>,
}

#[derive(Serialize)]
pub struct UnregisterResponse {
    pub removed: u64,
}

/// Register or refresh an FCM token. A token re-registered from another
/// account moves to this user.
pub async fn register(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(body): Json<RegisterBody>,
) -> AppResult<Json<AppResponse<Device>>> {
    body.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let device = device_repo::upsert(
        &state.pool,
        user.id,
        &body.token,
        body.device_id.as_deref(),
        body.device_type.as_deref(),
    )
    .await?;
    Ok(ok(device))
}

/// Remove all of this user's registrations (logout)
pub async fn unregister(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<AppResponse<UnregisterResponse>>> {
    let removed = device_repo::delete_by_user(&state.pool, user.id).await?;
    Ok(ok_with_message(
        UnregisterResponse { removed },
        "Devices unregistered",
    ))
}
