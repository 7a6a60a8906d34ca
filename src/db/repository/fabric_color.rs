//! Fabric Color Repository
//!
//! Stock mutation primitives for the Inventory Ledger. Quantity is only ever
//! changed through the conditional update below plus a matching ledger row;
//! the guard `quantity >= 1` makes overselling impossible without row locks.

use super::RepoResult;
use crate::db::models::{FabricColor, InventoryTransaction, InventoryTxKind};
use crate::utils::time::now_millis;
use sqlx::{SqliteConnection, SqlitePool};

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<FabricColor>> {
    let row = sqlx::query_as::<_, FabricColor>("SELECT * FROM fabric_color WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Current quantity inside a transaction (post-update read)
pub async fn quantity(conn: &mut SqliteConnection, id: i64) -> RepoResult<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT quantity FROM fabric_color WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|(q,)| q))
}

/// Reserve one unit: `quantity -= 1` guarded by `quantity >= 1`.
///
/// Returns false when the row is missing or out of stock. Flips `in_stock`
/// off when the decrement empties the row.
pub async fn decrement_one(conn: &mut SqliteConnection, id: i64) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE fabric_color
         SET quantity = quantity - 1,
             in_stock = CASE WHEN quantity - 1 > 0 THEN 1 ELSE 0 END,
             updated_at = ?
         WHERE id = ? AND quantity >= 1",
    )
    .bind(now_millis())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Restore one unit: `quantity += 1`, row comes back in stock
pub async fn increment_one(conn: &mut SqliteConnection, id: i64) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE fabric_color
         SET quantity = quantity + 1, in_stock = 1, updated_at = ?
         WHERE id = ?",
    )
    .bind(now_millis())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Append one ledger entry
pub async fn append_transaction(
    conn: &mut SqliteConnection,
    fabric_color_id: i64,
    kind: InventoryTxKind,
    delta: i64,
    quantity_before: i64,
    quantity_after: i64,
    invoice_number: Option<&str>,
    note: Option<&str>,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO inventory_transaction
         (fabric_color_id, kind, delta, quantity_before, quantity_after, invoice_number, note, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(fabric_color_id)
    .bind(kind)
    .bind(delta)
    .bind(quantity_before)
    .bind(quantity_after)
    .bind(invoice_number)
    .bind(note)
    .bind(now_millis())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Full ledger for one color, oldest first
pub async fn list_transactions(
    pool: &SqlitePool,
    fabric_color_id: i64,
) -> RepoResult<Vec<InventoryTransaction>> {
    let rows = sqlx::query_as::<_, InventoryTransaction>(
        "SELECT * FROM inventory_transaction WHERE fabric_color_id = ? ORDER BY id ASC",
    )
    .bind(fabric_color_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Sum of deltas for a color; must always equal the row's `quantity` minus
/// its seeded base
pub async fn sum_deltas(pool: &SqlitePool, fabric_color_id: i64) -> RepoResult<i64> {
    let (sum,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(delta), 0) FROM inventory_transaction WHERE fabric_color_id = ?",
    )
    .bind(fabric_color_id)
    .fetch_one(pool)
    .await?;
    Ok(sum)
}
