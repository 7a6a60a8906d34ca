//! User Repository

use super::RepoResult;
use sqlx::SqlitePool;

/// Name and email pair the gateway receives as UDF fields
pub async fn find_contact(pool: &SqlitePool, id: i64) -> RepoResult<Option<(String, String)>> {
    let row: Option<(String, String)> = sqlx::query_as("SELECT name, email FROM user WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}
