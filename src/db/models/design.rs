//! User Design Model
//!
//! 购物车时刻的服装配置快照，不可变。每个子部件引用一个 fabric_color。

use serde::{Deserialize, Serialize};

/// Immutable snapshot of a configured garment at cart time
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserDesign {
    pub id: i64,
    pub user_id: i64,
    pub body_color_id: Option<i64>,
    pub collar_color_id: Option<i64>,
    pub sleeve_left_color_id: Option<i64>,
    pub sleeve_right_color_id: Option<i64>,
    pub pocket_color_id: Option<i64>,
    pub button_color_id: Option<i64>,
    pub button_strip_color_id: Option<i64>,
    /// 设计总价 (fils)，下单时以此为准，不信任客户端金额
    #[serde(with = "crate::utils::money::kwd")]
    pub price_fils: i64,
    pub created_at: i64,
}

impl UserDesign {
    /// Component references in a fixed label order
    pub fn components(&self) -> [(&'static str, Option<i64>); 7] {
        [
            ("body", self.body_color_id),
            ("collar", self.collar_color_id),
            ("sleeve_left", self.sleeve_left_color_id),
            ("sleeve_right", self.sleeve_right_color_id),
            ("pocket", self.pocket_color_id),
            ("button", self.button_color_id),
            ("button_strip", self.button_strip_color_id),
        ]
    }

    /// Referenced fabric-color ids, de-duplicated, ascending
    ///
    /// 同一设计中复用同一颜色只占一个库存单位；升序保证并发下
    /// 加锁顺序确定，避免死锁。
    pub fn unique_color_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .components()
            .iter()
            .filter_map(|(_, id)| *id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Labels of the components referencing the given color
    pub fn labels_for(&self, color_id: i64) -> Vec<&'static str> {
        self.components()
            .iter()
            .filter(|(_, id)| *id == Some(color_id))
            .map(|(label, _)| *label)
            .collect()
    }
}
