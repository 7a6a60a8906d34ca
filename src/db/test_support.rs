//! Shared test fixtures: tempfile-backed pool with production pragmas,
//! plus seed helpers for users, stock, and designs.

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;

use crate::utils::time::now_millis;

/// Owns the temp dir so the database file outlives the pool
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: tempfile::TempDir,
}

/// Fresh migrated database. File-backed (not `:memory:`) so every pooled
/// connection sees the same data, matching production concurrency.
pub async fn setup() -> TestDb {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("test.db");

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .expect("db options")
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .pragma("foreign_keys", "ON")
        .pragma("busy_timeout", "5000");

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .expect("open test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    TestDb { pool, _dir: dir }
}

pub async fn seed_user(pool: &SqlitePool, name: &str, role: &str) -> i64 {
    sqlx::query("INSERT INTO user (name, email, phone, role, created_at) VALUES (?, ?, NULL, ?, ?)")
        .bind(name)
        .bind(format!("{}@test.local", name.to_lowercase().replace(' ', ".")))
        .bind(role)
        .bind(now_millis())
        .execute(pool)
        .await
        .expect("seed user")
        .last_insert_rowid()
}

pub async fn seed_fabric_type(pool: &SqlitePool) -> i64 {
    sqlx::query("INSERT INTO fabric_type (name_en, name_ar, created_at) VALUES ('Cotton', 'قطن', ?)")
        .bind(now_millis())
        .execute(pool)
        .await
        .expect("seed fabric type")
        .last_insert_rowid()
}

pub async fn seed_fabric_color(pool: &SqlitePool, fabric_type_id: i64, quantity: i64) -> i64 {
    sqlx::query(
        "INSERT INTO fabric_color
         (fabric_type_id, name_en, name_ar, price_adjustment_fils, quantity, in_stock, created_at, updated_at)
         VALUES (?, 'White', 'أبيض', 0, ?, ?, ?, ?)",
    )
    .bind(fabric_type_id)
    .bind(quantity)
    .bind(quantity > 0)
    .bind(now_millis())
    .bind(now_millis())
    .execute(pool)
    .await
    .expect("seed fabric color")
    .last_insert_rowid()
}

pub async fn seed_design(
    pool: &SqlitePool,
    user_id: i64,
    body: Option<i64>,
    collar: Option<i64>,
    pocket: Option<i64>,
    price_fils: i64,
) -> i64 {
    sqlx::query(
        "INSERT INTO user_design
         (user_id, body_color_id, collar_color_id, pocket_color_id, price_fils, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(body)
    .bind(collar)
    .bind(pocket)
    .bind(price_fils)
    .bind(now_millis())
    .execute(pool)
    .await
    .expect("seed design")
    .last_insert_rowid()
}

#[allow(clippy::too_many_arguments)]
pub async fn seed_percentage_coupon(
    pool: &SqlitePool,
    code: &str,
    percent: i64,
    max_discount_fils: Option<i64>,
    min_order_fils: i64,
    max_uses: Option<i64>,
    max_uses_per_user: Option<i64>,
    is_active: bool,
) -> i64 {
    sqlx::query(
        "INSERT INTO coupon
         (code, kind, percent, max_discount_fils, min_order_fils, max_uses, max_uses_per_user,
          use_count, is_active, created_at)
         VALUES (?, 'percentage', ?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(code)
    .bind(percent)
    .bind(max_discount_fils)
    .bind(min_order_fils)
    .bind(max_uses)
    .bind(max_uses_per_user)
    .bind(is_active)
    .bind(now_millis())
    .execute(pool)
    .await
    .expect("seed coupon")
    .last_insert_rowid()
}

pub async fn seed_device(pool: &SqlitePool, user_id: i64, token: &str) {
    sqlx::query("INSERT INTO device (user_id, token, refreshed_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(now_millis())
        .execute(pool)
        .await
        .expect("seed device");
}
