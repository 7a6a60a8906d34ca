//! Device Repository
//!
//! FCM token registry. Tokens are unique; re-registering a token moves it to
//! the new user (same handset, new login).

use super::RepoResult;
use crate::db::models::Device;
use crate::utils::time::now_millis;
use sqlx::SqlitePool;

pub async fn upsert(
    pool: &SqlitePool,
    user_id: i64,
    token: &str,
    device_id: Option<&str>,
    device_type: Option<&str>,
) -> RepoResult<Device> {
    sqlx::query(
        "INSERT INTO device (user_id, token, device_id, device_type, refreshed_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(token) DO UPDATE SET
             user_id = excluded.user_id,
             device_id = excluded.device_id,
             device_type = excluded.device_type,
             refreshed_at = excluded.refreshed_at",
    )
    .bind(user_id)
    .bind(token)
    .bind(device_id)
    .bind(device_type)
    .bind(now_millis())
    .execute(pool)
    .await?;

    let device = sqlx::query_as::<_, Device>("SELECT * FROM device WHERE token = ?")
        .bind(token)
        .fetch_one(pool)
        .await?;
    Ok(device)
}

/// Clear all registrations for a user (logout)
pub async fn delete_by_user(pool: &SqlitePool, user_id: i64) -> RepoResult<u64> {
    let rows = sqlx::query("DELETE FROM device WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(rows.rows_affected())
}

/// Registered tokens for push fan-out
pub async fn list_tokens(pool: &SqlitePool, user_id: i64) -> RepoResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT token FROM device WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(t,)| t).collect())
}
