//! Coupon Repository

use super::RepoResult;
use crate::db::models::Coupon;
use crate::utils::time::now_millis;
use sqlx::{SqliteConnection, SqlitePool};

pub async fn find_by_code(pool: &SqlitePool, code: &str) -> RepoResult<Option<Coupon>> {
    let row = sqlx::query_as::<_, Coupon>("SELECT * FROM coupon WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// How many times this user has already redeemed the coupon
pub async fn count_uses_by_user(
    pool: &SqlitePool,
    coupon_id: i64,
    user_id: i64,
) -> RepoResult<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM coupon_usage WHERE coupon_id = ? AND user_id = ?")
            .bind(coupon_id)
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Atomically claim one use. Returns false when the per-coupon cap is
/// exhausted; runs inside the placement transaction.
pub async fn increment_use(conn: &mut SqliteConnection, coupon_id: i64) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE coupon SET use_count = use_count + 1
         WHERE id = ? AND (max_uses IS NULL OR use_count < max_uses)",
    )
    .bind(coupon_id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() > 0)
}

pub async fn insert_usage(
    conn: &mut SqliteConnection,
    coupon_id: i64,
    user_id: i64,
    order_id: i64,
    discount_fils: i64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO coupon_usage (coupon_id, user_id, order_id, discount_fils, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(coupon_id)
    .bind(user_id)
    .bind(order_id)
    .bind(discount_fils)
    .bind(now_millis())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
