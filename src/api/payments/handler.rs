//! Payment API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::Payment;
use crate::utils::{AppResponse, AppResult, ok};

#[derive(Debug, Deserialize)]
pub struct InitiateBody {
    pub order_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub track_id: String,
}

/// Gateway redirect query. Only `trackid` is read; the rest of the query
/// string is untrusted noise.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub trackid: Option<String>,
}

/// Open a gateway session for a pending KNET order
pub async fn initiate(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(body): Json<InitiateBody>,
) -> AppResult<Json<AppResponse<Payment>>> {
    let payment = state
        .payment_coordinator()
        .initiate(user.id, body.order_id)
        .await?;
    Ok(ok(payment))
}

/// Gateway browser landing. Always answers 302 back into the app, even on
/// verification trouble or a missing/unknown track id.
pub async fn callback(
    State(state): State<ServerState>,
    Query(query): Query<CallbackQuery>,
) -> AppResult<(StatusCode, [(header::HeaderName, String); 1])> {
    let coordinator = state.payment_coordinator();
    let target = match query.trackid {
        Some(track_id) => coordinator.handle_callback(&track_id).await?,
        None => coordinator.system_error_url(),
    };
    // axum's Redirect answers 303; the gateway contract is a plain 302
    Ok((StatusCode::FOUND, [(header::LOCATION, target)]))
}

/// Manual verification (app polling after the browser round trip)
pub async fn verify(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(body): Json<VerifyBody>,
) -> AppResult<Json<AppResponse<Payment>>> {
    let payment = state
        .payment_coordinator()
        .verify(user.id, &body.track_id)
        .await?;
    Ok(ok(payment))
}

/// Payment detail scoped to its owner
pub async fn get_by_track_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(track_id): Path<String>,
) -> AppResult<Json<AppResponse<Payment>>> {
    let payment = state
        .payment_coordinator()
        .find_owned(user.id, &track_id)
        .await?;
    Ok(ok(payment))
}
