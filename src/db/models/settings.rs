//! Delivery Settings Model

use serde::{Deserialize, Serialize};

/// Delivery fee configuration; exactly one row is active at a time
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeliverySettings {
    pub id: i64,
    #[serde(with = "crate::utils::money::kwd")]
    pub delivery_fee_fils: i64,
    pub is_active: bool,
    pub updated_at: i64,
}
