//! Order Repository
//!
//! `invoice_number` UNIQUE 索引负责发票号防撞；插入冲突以
//! [`RepoError::Duplicate`] 返回，由上层重试。

use super::{RepoError, RepoResult};
use crate::db::models::{CancelledBy, Order, OrderCreate, OrderItem, OrderItemCreate, OrderStatus};
use crate::utils::time::now_millis;
use sqlx::{SqliteConnection, SqlitePool};

/// Insert a new order in status `pending` with `pending_at = now`
pub async fn insert(conn: &mut SqliteConnection, data: &OrderCreate) -> RepoResult<i64> {
    let now = now_millis();
    let result = sqlx::query(
        "INSERT INTO orders
         (invoice_number, user_id,
          address_area, address_block, address_street, address_house, address_notes,
          contact_name, contact_phone,
          total_price_fils, delivery_fee_fils, discount_fils, coupon_code,
          payment_method, status, pending_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
    )
    .bind(&data.invoice_number)
    .bind(data.user_id)
    .bind(&data.address_area)
    .bind(&data.address_block)
    .bind(&data.address_street)
    .bind(&data.address_house)
    .bind(&data.address_notes)
    .bind(&data.contact_name)
    .bind(&data.contact_phone)
    .bind(data.total_price_fils)
    .bind(data.delivery_fee_fils)
    .bind(data.discount_fils)
    .bind(&data.coupon_code)
    .bind(data.payment_method)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn insert_item(
    conn: &mut SqliteConnection,
    order_id: i64,
    item: &OrderItemCreate,
) -> RepoResult<i64> {
    let result = sqlx::query(
        "INSERT INTO order_item
         (order_id, design_id, product_name, size_snapshot,
          unit_price_fils, quantity, discount_percent, net_amount_fils, design_breakdown)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(item.design_id)
    .bind(&item.product_name)
    .bind(&item.size_snapshot)
    .bind(item.unit_price_fils)
    .bind(item.quantity)
    .bind(item.discount_percent)
    .bind(item.net_amount_fils)
    .bind(&item.design_breakdown)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Order>> {
    let row = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Load inside a caller-owned transaction (state-machine read)
pub async fn find_by_id_conn(conn: &mut SqliteConnection, id: i64) -> RepoResult<Option<Order>> {
    let row = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

/// Paginated listing for one user, most recent first
pub async fn list_by_user(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_items(pool: &SqlitePool, order_id: i64) -> RepoResult<Vec<OrderItem>> {
    let rows =
        sqlx::query_as::<_, OrderItem>("SELECT * FROM order_item WHERE order_id = ? ORDER BY id")
            .bind(order_id)
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

/// Apply a status transition.
///
/// The destination timestamp is written with COALESCE so a timestamp, once
/// set, is never overwritten. Cancellation metadata is only written when the
/// destination is `cancelled`.
pub async fn apply_transition(
    conn: &mut SqliteConnection,
    id: i64,
    to: OrderStatus,
    cancelled_by: Option<CancelledBy>,
    cancellation_reason: Option<&str>,
) -> RepoResult<()> {
    let column = to.timestamp_column();
    let sql = format!(
        "UPDATE orders
         SET status = ?,
             {column} = COALESCE({column}, ?),
             cancelled_by = COALESCE(?, cancelled_by),
             cancellation_reason = COALESCE(?, cancellation_reason)
         WHERE id = ?"
    );
    let rows = sqlx::query(&sql)
        .bind(to)
        .bind(now_millis())
        .bind(cancelled_by)
        .bind(cancellation_reason)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Order {id} not found")));
    }
    Ok(())
}
