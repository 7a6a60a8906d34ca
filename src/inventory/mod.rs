//! Inventory Ledger
//!
//! 面料颜色库存的唯一修改入口。每次变更 = 条件更新 + 一条 append-only
//! 流水，同一事务内提交。
//!
//! # 防超卖
//!
//! 扣减使用条件更新：
//! `UPDATE fabric_color SET quantity = quantity - 1 WHERE id = ? AND quantity >= 1`，
//! 零行受影响即库存不足。颜色按 id 升序处理，并发下单时锁顺序确定。
//!
//! # 去重
//!
//! 同一设计内复用同一颜色只消耗一个单位 (按 fabric_color_id 去重)。

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::models::{InventoryTxKind, UserDesign};
use crate::db::repository::fabric_color;
use crate::utils::{AppError, AppResult};

/// One missing component in an `InsufficientStock` refusal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    pub component: String,
    pub fabric_color_id: i64,
    pub available: i64,
}

/// Outcome of a ledger mutation
#[derive(Debug, Default)]
pub struct LedgerOutcome {
    /// Colors whose `in_stock` flag flipped; callers use this to emit
    /// `fabric_catalog_changed`
    pub stock_flipped: Vec<i64>,
}

/// Pure read: can every referenced color supply one unit?
pub async fn check_availability(
    pool: &SqlitePool,
    design: &UserDesign,
) -> AppResult<(bool, Vec<Shortage>)> {
    let mut shortages = Vec::new();
    for color_id in design.unique_color_ids() {
        let available = fabric_color::find_by_id(pool, color_id)
            .await?
            .map(|c| c.quantity)
            .unwrap_or(0);
        if available < 1 {
            for label in design.labels_for(color_id) {
                shortages.push(Shortage {
                    component: label.to_string(),
                    fabric_color_id: color_id,
                    available,
                });
            }
        }
    }
    Ok((shortages.is_empty(), shortages))
}

/// Reserve one unit from every referenced fabric color, atomically.
///
/// Runs inside the caller's transaction: a failure leaves no partial
/// decrement after rollback. Rejects a second reservation for the same
/// `(design, invoice_ref)` pair.
pub async fn reserve(
    conn: &mut SqliteConnection,
    design: &UserDesign,
    invoice_ref: &str,
) -> AppResult<LedgerOutcome> {
    let note = design_note(design.id);
    let existing = count_design_entries(conn, invoice_ref, InventoryTxKind::Order, &note).await?;
    if existing > 0 {
        return Err(AppError::conflict(format!(
            "Design {} already reserved for invoice {}",
            design.id, invoice_ref
        )));
    }

    let mut outcome = LedgerOutcome::default();
    let mut shortages = Vec::new();

    for color_id in design.unique_color_ids() {
        if !fabric_color::decrement_one(conn, color_id).await? {
            let available = fabric_color::quantity(conn, color_id).await?.unwrap_or(0);
            for label in design.labels_for(color_id) {
                shortages.push(Shortage {
                    component: label.to_string(),
                    fabric_color_id: color_id,
                    available,
                });
            }
            continue;
        }

        let after = fabric_color::quantity(conn, color_id)
            .await?
            .ok_or_else(|| AppError::internal(format!("Fabric color {color_id} vanished")))?;
        fabric_color::append_transaction(
            conn,
            color_id,
            InventoryTxKind::Order,
            -1,
            after + 1,
            after,
            Some(invoice_ref),
            Some(&note),
        )
        .await?;
        if after == 0 {
            outcome.stock_flipped.push(color_id);
        }
    }

    if !shortages.is_empty() {
        // Caller rolls back; the decrements above never land.
        return Err(AppError::InsufficientStock(shortages));
    }

    tracing::debug!(
        design_id = design.id,
        invoice = invoice_ref,
        "Inventory reserved"
    );
    Ok(outcome)
}

/// Restore one unit per referenced fabric color (cancellation compensation).
///
/// Idempotent per `(design, invoice_ref)`: a repeat call finds the Cancel
/// entries already in the ledger and changes nothing.
pub async fn restore(
    conn: &mut SqliteConnection,
    design: &UserDesign,
    invoice_ref: &str,
) -> AppResult<LedgerOutcome> {
    let note = design_note(design.id);
    let existing = count_design_entries(conn, invoice_ref, InventoryTxKind::Cancel, &note).await?;
    if existing > 0 {
        return Ok(LedgerOutcome::default());
    }

    let mut outcome = LedgerOutcome::default();

    for color_id in design.unique_color_ids() {
        if !fabric_color::increment_one(conn, color_id).await? {
            return Err(AppError::internal(format!(
                "Fabric color {color_id} missing during restore"
            )));
        }
        let after = fabric_color::quantity(conn, color_id)
            .await?
            .ok_or_else(|| AppError::internal(format!("Fabric color {color_id} vanished")))?;
        fabric_color::append_transaction(
            conn,
            color_id,
            InventoryTxKind::Cancel,
            1,
            after - 1,
            after,
            Some(invoice_ref),
            Some(&note),
        )
        .await?;
        if after == 1 {
            outcome.stock_flipped.push(color_id);
        }
    }

    tracing::debug!(
        design_id = design.id,
        invoice = invoice_ref,
        "Inventory restored"
    );
    Ok(outcome)
}

fn design_note(design_id: i64) -> String {
    format!("design:{design_id}")
}

async fn count_design_entries(
    conn: &mut SqliteConnection,
    invoice_ref: &str,
    kind: InventoryTxKind,
    note: &str,
) -> AppResult<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM inventory_transaction
         WHERE invoice_number = ? AND kind = ? AND note = ?",
    )
    .bind(invoice_ref)
    .bind(kind)
    .bind(note)
    .fetch_one(&mut *conn)
    .await
    .map_err(crate::db::repository::RepoError::from)?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::design as design_repo;
    use crate::db::repository::fabric_color as color_repo;
    use crate::db::test_support::{seed_design, seed_fabric_color, seed_fabric_type, seed_user, setup};

    async fn load_design(pool: &SqlitePool, id: i64) -> UserDesign {
        design_repo::find_by_id(pool, id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn reserve_then_restore_round_trips() {
        let db = setup().await;
        let user = seed_user(&db.pool, "Noor", "customer").await;
        let ft = seed_fabric_type(&db.pool).await;
        let body = seed_fabric_color(&db.pool, ft, 5).await;
        let collar = seed_fabric_color(&db.pool, ft, 3).await;
        let design_id = seed_design(&db.pool, user, Some(body), Some(collar), None, 10_000).await;
        let design = load_design(&db.pool, design_id).await;

        let mut tx = db.pool.begin().await.unwrap();
        reserve(&mut tx, &design, "INV-1").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            color_repo::find_by_id(&db.pool, body).await.unwrap().unwrap().quantity,
            4
        );

        let mut tx = db.pool.begin().await.unwrap();
        restore(&mut tx, &design, "INV-1").await.unwrap();
        tx.commit().await.unwrap();

        let body_row = color_repo::find_by_id(&db.pool, body).await.unwrap().unwrap();
        assert_eq!(body_row.quantity, 5);
        assert!(body_row.in_stock);

        // Exactly two log entries per unique color
        let log = color_repo::list_transactions(&db.pool, body).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].delta, -1);
        assert_eq!(log[1].delta, 1);
        assert_eq!(log[0].quantity_after, log[0].quantity_before - 1);
        assert_eq!(color_repo::sum_deltas(&db.pool, body).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_colors_within_design_consume_one_unit() {
        let db = setup().await;
        let user = seed_user(&db.pool, "Sara", "customer").await;
        let ft = seed_fabric_type(&db.pool).await;
        let color = seed_fabric_color(&db.pool, ft, 5).await;
        // body and pocket share the same color
        let design_id = seed_design(&db.pool, user, Some(color), None, Some(color), 10_000).await;
        let design = load_design(&db.pool, design_id).await;

        let mut tx = db.pool.begin().await.unwrap();
        reserve(&mut tx, &design, "INV-2").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            color_repo::find_by_id(&db.pool, color).await.unwrap().unwrap().quantity,
            4
        );
        let log = color_repo::list_transactions(&db.pool, color).await.unwrap();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn reserve_flips_in_stock_and_reports_shortage() {
        let db = setup().await;
        let user = seed_user(&db.pool, "Dana", "customer").await;
        let ft = seed_fabric_type(&db.pool).await;
        let color = seed_fabric_color(&db.pool, ft, 1).await;
        let design_id = seed_design(&db.pool, user, Some(color), None, None, 10_000).await;
        let design = load_design(&db.pool, design_id).await;

        let mut tx = db.pool.begin().await.unwrap();
        let outcome = reserve(&mut tx, &design, "INV-3").await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(outcome.stock_flipped, vec![color]);

        let row = color_repo::find_by_id(&db.pool, color).await.unwrap().unwrap();
        assert_eq!(row.quantity, 0);
        assert!(!row.in_stock);

        // Second reservation fails and leaves no partial state
        let mut tx = db.pool.begin().await.unwrap();
        let err = reserve(&mut tx, &design, "INV-4").await.unwrap_err();
        tx.rollback().await.unwrap();
        match err {
            AppError::InsufficientStock(shortages) => {
                assert_eq!(shortages.len(), 1);
                assert_eq!(shortages[0].component, "body");
                assert_eq!(shortages[0].fabric_color_id, color);
                assert_eq!(shortages[0].available, 0);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        let log = color_repo::list_transactions(&db.pool, color).await.unwrap();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn reserve_same_invoice_twice_is_rejected() {
        let db = setup().await;
        let user = seed_user(&db.pool, "Omar", "customer").await;
        let ft = seed_fabric_type(&db.pool).await;
        let color = seed_fabric_color(&db.pool, ft, 5).await;
        let design_id = seed_design(&db.pool, user, Some(color), None, None, 10_000).await;
        let design = load_design(&db.pool, design_id).await;

        let mut tx = db.pool.begin().await.unwrap();
        reserve(&mut tx, &design, "INV-5").await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.pool.begin().await.unwrap();
        let err = reserve(&mut tx, &design, "INV-5").await.unwrap_err();
        tx.rollback().await.unwrap();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(
            color_repo::find_by_id(&db.pool, color).await.unwrap().unwrap().quantity,
            4
        );
    }

    #[tokio::test]
    async fn repeated_restore_changes_nothing() {
        let db = setup().await;
        let user = seed_user(&db.pool, "Reem", "customer").await;
        let ft = seed_fabric_type(&db.pool).await;
        let color = seed_fabric_color(&db.pool, ft, 3).await;
        let design_id = seed_design(&db.pool, user, Some(color), None, None, 10_000).await;
        let design = load_design(&db.pool, design_id).await;

        let mut tx = db.pool.begin().await.unwrap();
        reserve(&mut tx, &design, "INV-6").await.unwrap();
        tx.commit().await.unwrap();

        for _ in 0..2 {
            let mut tx = db.pool.begin().await.unwrap();
            restore(&mut tx, &design, "INV-6").await.unwrap();
            tx.commit().await.unwrap();
        }

        assert_eq!(
            color_repo::find_by_id(&db.pool, color).await.unwrap().unwrap().quantity,
            3
        );
        // One ORDER entry, one CANCEL entry; the repeat left no trace
        let log = color_repo::list_transactions(&db.pool, color).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(color_repo::sum_deltas(&db.pool, color).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_reservations_cannot_oversell() {
        let db = setup().await;
        let user = seed_user(&db.pool, "Ali", "customer").await;
        let ft = seed_fabric_type(&db.pool).await;
        let color = seed_fabric_color(&db.pool, ft, 1).await;
        let d1 = seed_design(&db.pool, user, Some(color), None, None, 10_000).await;
        let d2 = seed_design(&db.pool, user, None, Some(color), None, 10_000).await;
        let design_a = load_design(&db.pool, d1).await;
        let design_b = load_design(&db.pool, d2).await;

        let pool_a = db.pool.clone();
        let pool_b = db.pool.clone();
        let task_a = tokio::spawn(async move {
            let mut tx = pool_a.begin().await.unwrap();
            let res = reserve(&mut tx, &design_a, "INV-A").await;
            match res {
                Ok(_) => {
                    tx.commit().await.unwrap();
                    Ok(())
                }
                Err(e) => {
                    tx.rollback().await.unwrap();
                    Err(e)
                }
            }
        });
        let task_b = tokio::spawn(async move {
            let mut tx = pool_b.begin().await.unwrap();
            let res = reserve(&mut tx, &design_b, "INV-B").await;
            match res {
                Ok(_) => {
                    tx.commit().await.unwrap();
                    Ok(())
                }
                Err(e) => {
                    tx.rollback().await.unwrap();
                    Err(e)
                }
            }
        });

        let (a, b) = tokio::join!(task_a, task_b);
        let results = [a.unwrap(), b.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one reservation must win");

        let row = color_repo::find_by_id(&db.pool, color).await.unwrap().unwrap();
        assert_eq!(row.quantity, 0);
        // Exactly one ORDER entry in the ledger
        let log = color_repo::list_transactions(&db.pool, color).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, InventoryTxKind::Order);
    }

    #[tokio::test]
    async fn check_availability_enumerates_shortages() {
        let db = setup().await;
        let user = seed_user(&db.pool, "Huda", "customer").await;
        let ft = seed_fabric_type(&db.pool).await;
        let empty = seed_fabric_color(&db.pool, ft, 0).await;
        let stocked = seed_fabric_color(&db.pool, ft, 2).await;
        let design_id =
            seed_design(&db.pool, user, Some(empty), Some(stocked), None, 10_000).await;
        let design = load_design(&db.pool, design_id).await;

        let (ok, shortages) = check_availability(&db.pool, &design).await.unwrap();
        assert!(!ok);
        assert_eq!(shortages.len(), 1);
        assert_eq!(shortages[0].fabric_color_id, empty);
    }
}
