//! Delivery Settings Repository

use super::{RepoError, RepoResult};
use crate::db::models::DeliverySettings;
use sqlx::SqlitePool;

/// The active delivery-settings record
pub async fn find_active(pool: &SqlitePool) -> RepoResult<DeliverySettings> {
    sqlx::query_as::<_, DeliverySettings>(
        "SELECT * FROM delivery_settings WHERE is_active = 1 ORDER BY updated_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| RepoError::NotFound("No active delivery settings".into()))
}
