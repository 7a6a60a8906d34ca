//! Notification Log Repository

use super::RepoResult;
use crate::db::models::NotificationLog;
use crate::utils::time::now_millis;
use sqlx::SqlitePool;

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    pool: &SqlitePool,
    user_id: Option<i64>,
    event_type: &str,
    title: &str,
    body: &str,
    data: Option<&str>,
    was_sent: bool,
    error_message: Option<&str>,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO notification_log
         (user_id, event_type, title, body, data, was_sent, error_message, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(event_type)
    .bind(title)
    .bind(body)
    .bind(data)
    .bind(was_sent)
    .bind(error_message)
    .bind(now_millis())
    .execute(pool)
    .await?;
    Ok(())
}

/// Recent log entries, newest first (admin diagnostics and tests)
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> RepoResult<Vec<NotificationLog>> {
    let rows = sqlx::query_as::<_, NotificationLog>(
        "SELECT * FROM notification_log ORDER BY id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
