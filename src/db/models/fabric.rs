//! Fabric Color & Inventory Transaction Models
//!
//! `fabric_color` 是唯一持有库存的实体，只允许通过 Inventory Ledger 修改。
//! `inventory_transaction` 为 append-only 流水，随时可以重放出当前库存。

use serde::{Deserialize, Serialize};

/// A stocked material variant — the only inventory-bearing entity
///
/// Invariant: `in_stock` ⇔ `quantity > 0`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FabricColor {
    pub id: i64,
    pub fabric_type_id: i64,
    pub name_en: String,
    pub name_ar: String,
    /// 单价调整 (fils)
    #[serde(with = "crate::utils::money::kwd")]
    pub price_adjustment_fils: i64,
    pub quantity: i64,
    pub in_stock: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Ledger entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum InventoryTxKind {
    /// 下单扣减 (delta = -1)
    Order,
    /// 取消回补 (delta = +1)
    Cancel,
    /// 人工调整
    Manual,
    /// 进货
    Restock,
}

/// Append-only stock ledger entry
///
/// Invariant: `quantity_after = quantity_before + delta`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryTransaction {
    pub id: i64,
    pub fabric_color_id: i64,
    pub kind: InventoryTxKind,
    pub delta: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub invoice_number: Option<String>,
    pub note: Option<String>,
    pub created_at: i64,
}
