//! Coupon Model

use serde::{Deserialize, Serialize};

/// Discount shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CouponKind {
    /// `percent` of the subtotal, optionally capped by `max_discount_fils`
    Percentage,
    /// Flat `value_fils`
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub kind: CouponKind,
    pub percent: Option<i64>,
    pub value_fils: Option<i64>,
    pub max_discount_fils: Option<i64>,
    pub min_order_fils: i64,
    /// NULL = unlimited
    pub max_uses: Option<i64>,
    pub max_uses_per_user: Option<i64>,
    pub use_count: i64,
    pub is_active: bool,
    pub valid_from: Option<i64>,
    pub valid_until: Option<i64>,
    pub created_at: i64,
}

/// Why a coupon was refused (400 payload)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CouponIneligibleReason {
    Inactive,
    Expired,
    NotYetValid,
    UsageLimitReached,
    UserLimitReached,
    BelowMinimum,
}

impl std::fmt::Display for CouponIneligibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CouponIneligibleReason::Inactive => "inactive",
            CouponIneligibleReason::Expired => "expired",
            CouponIneligibleReason::NotYetValid => "not-yet-valid",
            CouponIneligibleReason::UsageLimitReached => "usage-limit-reached",
            CouponIneligibleReason::UserLimitReached => "user-limit-reached",
            CouponIneligibleReason::BelowMinimum => "below-minimum",
        };
        f.write_str(s)
    }
}
