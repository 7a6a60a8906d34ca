//! Cancellation Request Repository

use super::{RepoError, RepoResult};
use crate::db::models::{CancellationRequest, CancellationStatus};
use crate::utils::time::now_millis;
use sqlx::SqlitePool;

pub async fn insert(
    pool: &SqlitePool,
    order_id: i64,
    user_id: i64,
    reason: &str,
) -> RepoResult<CancellationRequest> {
    let result = sqlx::query(
        "INSERT INTO cancellation_request (order_id, user_id, reason, status, created_at)
         VALUES (?, ?, ?, 'pending', ?)",
    )
    .bind(order_id)
    .bind(user_id)
    .bind(reason)
    .bind(now_millis())
    .execute(pool)
    .await?;

    find_by_id(pool, result.last_insert_rowid())
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create cancellation request".into()))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<CancellationRequest>> {
    let row =
        sqlx::query_as::<_, CancellationRequest>("SELECT * FROM cancellation_request WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(row)
}

/// Open request for an order, if any (prevents duplicate tickets)
pub async fn find_pending_by_order(
    pool: &SqlitePool,
    order_id: i64,
) -> RepoResult<Option<CancellationRequest>> {
    let row = sqlx::query_as::<_, CancellationRequest>(
        "SELECT * FROM cancellation_request WHERE order_id = ? AND status = 'pending' LIMIT 1",
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list_by_order(
    pool: &SqlitePool,
    order_id: i64,
) -> RepoResult<Vec<CancellationRequest>> {
    let rows = sqlx::query_as::<_, CancellationRequest>(
        "SELECT * FROM cancellation_request WHERE order_id = ? ORDER BY id DESC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Pending tickets for the admin queue, oldest first
pub async fn list_pending(pool: &SqlitePool) -> RepoResult<Vec<CancellationRequest>> {
    let rows = sqlx::query_as::<_, CancellationRequest>(
        "SELECT * FROM cancellation_request WHERE status = 'pending' ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Resolve a pending request. The `status = 'pending'` guard makes
/// resolution exactly-once: a second resolve sees zero rows and fails.
pub async fn resolve(
    pool: &SqlitePool,
    id: i64,
    status: CancellationStatus,
    admin_notes: Option<&str>,
    processed_by: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE cancellation_request
         SET status = ?, admin_notes = ?, processed_by = ?, processed_at = ?
         WHERE id = ? AND status = 'pending'",
    )
    .bind(status)
    .bind(admin_notes)
    .bind(processed_by)
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(rows.rows_affected() > 0)
}
