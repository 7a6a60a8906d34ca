//! User Design Repository

use super::RepoResult;
use crate::db::models::UserDesign;
use sqlx::SqlitePool;

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<UserDesign>> {
    let row = sqlx::query_as::<_, UserDesign>("SELECT * FROM user_design WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Designs referenced by an order's items (used for cancellation restore)
pub async fn find_by_order(pool: &SqlitePool, order_id: i64) -> RepoResult<Vec<UserDesign>> {
    let rows = sqlx::query_as::<_, UserDesign>(
        "SELECT d.* FROM user_design d
         JOIN order_item i ON i.design_id = d.id
         WHERE i.order_id = ?",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
