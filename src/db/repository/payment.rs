//! Payment Repository
//!
//! `track_id` 与 `idempotency_key` 均为 UNIQUE；重复发起会命中
//! [`RepoError::Duplicate`]，由 Coordinator 返回既有记录。

use super::RepoResult;
use crate::db::models::{Payment, PaymentStatus};
use crate::utils::time::now_millis;
use sqlx::SqlitePool;

/// Insert payload for a freshly initiated gateway session
#[derive(Debug, Clone)]
pub struct PaymentCreate {
    pub order_id: i64,
    pub track_id: String,
    pub idempotency_key: String,
    pub gateway_payment_id: Option<String>,
    pub amount_fils: i64,
    pub success_url: String,
    pub error_url: String,
    pub redirect_url: Option<String>,
}

pub async fn insert(pool: &SqlitePool, data: &PaymentCreate) -> RepoResult<Payment> {
    sqlx::query(
        "INSERT INTO payment
         (order_id, track_id, idempotency_key, gateway_payment_id, status,
          amount_fils, currency, success_url, error_url, redirect_url, created_at)
         VALUES (?, ?, ?, ?, 'pending', ?, 'KWD', ?, ?, ?, ?)",
    )
    .bind(data.order_id)
    .bind(&data.track_id)
    .bind(&data.idempotency_key)
    .bind(&data.gateway_payment_id)
    .bind(data.amount_fils)
    .bind(&data.success_url)
    .bind(&data.error_url)
    .bind(&data.redirect_url)
    .bind(now_millis())
    .execute(pool)
    .await?;

    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payment WHERE track_id = ?")
        .bind(&data.track_id)
        .fetch_one(pool)
        .await?;
    Ok(payment)
}

pub async fn find_by_track_id(pool: &SqlitePool, track_id: &str) -> RepoResult<Option<Payment>> {
    let row = sqlx::query_as::<_, Payment>("SELECT * FROM payment WHERE track_id = ?")
        .bind(track_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_idempotency_key(
    pool: &SqlitePool,
    idempotency_key: &str,
) -> RepoResult<Option<Payment>> {
    let row = sqlx::query_as::<_, Payment>("SELECT * FROM payment WHERE idempotency_key = ?")
        .bind(idempotency_key)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Latest payment bound to an order, if any
pub async fn find_by_order(pool: &SqlitePool, order_id: i64) -> RepoResult<Option<Payment>> {
    let row = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payment WHERE order_id = ? ORDER BY id DESC LIMIT 1",
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn find_captured_by_order(
    pool: &SqlitePool,
    order_id: i64,
) -> RepoResult<Option<Payment>> {
    let row = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payment WHERE order_id = ? AND status = 'captured' LIMIT 1",
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Drop the stale pending session before a clean retry
pub async fn delete_pending_by_order(pool: &SqlitePool, order_id: i64) -> RepoResult<u64> {
    let rows = sqlx::query("DELETE FROM payment WHERE order_id = ? AND status = 'pending'")
        .bind(order_id)
        .execute(pool)
        .await?;
    Ok(rows.rows_affected())
}

/// Record a gateway verification result.
///
/// Captured is sticky: once `status = captured` it never changes, and
/// `completed_at` is never overwritten. The attempt counter always moves.
pub async fn record_verification(
    pool: &SqlitePool,
    track_id: &str,
    status: PaymentStatus,
    raw_gateway_status: &str,
    gateway_payment_id: Option<&str>,
    reference_code: Option<&str>,
) -> RepoResult<Payment> {
    sqlx::query(
        "UPDATE payment
         SET status = CASE WHEN status = 'captured' THEN 'captured' ELSE ? END,
             raw_gateway_status = ?,
             gateway_payment_id = COALESCE(?, gateway_payment_id),
             reference_code = COALESCE(?, reference_code),
             verification_attempts = verification_attempts + 1,
             verified_with_gateway = 1,
             completed_at = CASE
                 WHEN completed_at IS NOT NULL THEN completed_at
                 WHEN ? = 'captured' THEN ?
                 ELSE NULL
             END
         WHERE track_id = ?",
    )
    .bind(status)
    .bind(raw_gateway_status)
    .bind(gateway_payment_id)
    .bind(reference_code)
    .bind(status)
    .bind(now_millis())
    .bind(track_id)
    .execute(pool)
    .await?;

    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payment WHERE track_id = ?")
        .bind(track_id)
        .fetch_one(pool)
        .await?;
    Ok(payment)
}

/// Bump only the attempt counter (idempotent callback re-entry on an
/// already-captured payment)
pub async fn bump_verification_attempts(pool: &SqlitePool, track_id: &str) -> RepoResult<()> {
    sqlx::query(
        "UPDATE payment SET verification_attempts = verification_attempts + 1 WHERE track_id = ?",
    )
    .bind(track_id)
    .execute(pool)
    .await?;
    Ok(())
}
