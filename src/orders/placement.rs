//! Order Placement
//!
//! 下单聚合根：服务端定价 + 优惠券评估 + 发票号分配 + 库存预留，
//! 全部在一个事务里完成。任何一步失败整单回滚，不留半个库存扣减。
//!
//! 金额永远以服务端 `user_design.price_fils` 为准，客户端金额不参与计算。

use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use validator::Validate;

use crate::db::models::{
    Coupon, CouponIneligibleReason, CouponKind, Order, OrderCreate, OrderItem, OrderItemCreate,
    OrderStatus, PaymentMethod, UserDesign,
};
use crate::db::repository::{
    RepoError, coupon as coupon_repo, design as design_repo, order as order_repo,
    settings as settings_repo,
};
use crate::inventory;
use crate::notifications::{NotificationDispatcher, NotificationEvent};
use crate::utils::money::{fils_to_kwd, percent_of};
use crate::utils::time::{now_millis, today_yyyymmdd};
use crate::utils::{AppError, AppResult};

/// Invoice allocation retries before giving up (UNIQUE collision on the
/// 4-digit suffix)
const INVOICE_RETRIES: usize = 5;

/// Size as the client sent it: a named default ("M") or a custom
/// measurement map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeDescriptor {
    Named(String),
    Custom(serde_json::Map<String, serde_json::Value>),
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderItem {
    pub design_id: i64,
    #[validate(length(min = 1, max = 120))]
    pub product_name: String,
    pub size: SizeDescriptor,
    #[validate(range(min = 1, max = 50))]
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 120))]
    pub area: String,
    pub block: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, max = 20), nested)]
    pub items: Vec<PlaceOrderItem>,
    #[validate(nested)]
    pub address: AddressInput,
    #[validate(length(min = 1, max = 120))]
    pub contact_name: String,
    #[validate(length(min = 5, max = 20))]
    pub contact_phone: String,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

/// Committed order plus its lines
#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Clone)]
pub struct PlacementService {
    pool: SqlitePool,
    dispatcher: NotificationDispatcher,
}

impl PlacementService {
    pub fn new(pool: SqlitePool, dispatcher: NotificationDispatcher) -> Self {
        Self { pool, dispatcher }
    }

    /// Place an order for `user_id`.
    ///
    /// One transaction covers invoice allocation, inventory reservation,
    /// line insertion, and the coupon claim. Pushes go out only after
    /// commit.
    pub async fn place(&self, user_id: i64, request: PlaceOrderRequest) -> AppResult<PlacedOrder> {
        request
            .validate()
            .map_err(|e| AppError::validation(e.to_string()))?;

        let delivery = settings_repo::find_active(&self.pool).await?;

        // Server-side pricing: resolve every line against the stored design.
        let mut lines: Vec<(UserDesign, &PlaceOrderItem)> = Vec::with_capacity(request.items.len());
        let mut subtotal: i64 = 0;
        for item in &request.items {
            let design = design_repo::find_by_id(&self.pool, item.design_id)
                .await?
                .filter(|d| d.user_id == user_id)
                .ok_or_else(|| {
                    AppError::not_found(format!("Design {} not found", item.design_id))
                })?;
            subtotal += design.price_fils * item.quantity;
            lines.push((design, item));
        }

        let coupon = match &request.coupon_code {
            Some(code) => {
                let coupon = coupon_repo::find_by_code(&self.pool, code)
                    .await?
                    .ok_or_else(|| AppError::not_found(format!("Coupon {code} not found")))?;
                Some(coupon)
            }
            None => None,
        };
        let discount_fils = match &coupon {
            Some(coupon) => evaluate_coupon(&self.pool, coupon, user_id, subtotal).await?,
            None => 0,
        };

        let total_price_fils = subtotal + delivery.delivery_fee_fils - discount_fils;

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let (order_id, invoice_number) = {
            let mut allocated = None;
            for _ in 0..INVOICE_RETRIES {
                let invoice = generate_invoice_number();
                let create = OrderCreate {
                    invoice_number: invoice.clone(),
                    user_id,
                    address_area: request.address.area.clone(),
                    address_block: request.address.block.clone(),
                    address_street: request.address.street.clone(),
                    address_house: request.address.house.clone(),
                    address_notes: request.address.notes.clone(),
                    contact_name: request.contact_name.clone(),
                    contact_phone: request.contact_phone.clone(),
                    total_price_fils,
                    delivery_fee_fils: delivery.delivery_fee_fils,
                    discount_fils,
                    coupon_code: coupon.as_ref().map(|c| c.code.clone()),
                    payment_method: request.payment_method,
                };
                match order_repo::insert(&mut tx, &create).await {
                    Ok(id) => {
                        allocated = Some((id, invoice));
                        break;
                    }
                    Err(RepoError::Duplicate(_)) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            allocated
                .ok_or_else(|| AppError::internal("Could not allocate a unique invoice number"))?
        };

        let mut flipped = Vec::new();
        for (design, _) in &lines {
            let outcome = inventory::reserve(&mut tx, design, &invoice_number).await?;
            flipped.extend(outcome.stock_flipped);
        }

        for (design, item) in &lines {
            let create = order_item_create(design, item)?;
            order_repo::insert_item(&mut tx, order_id, &create).await?;
        }

        if let Some(coupon) = &coupon {
            // Re-checked under the transaction; loser of a race gets refused
            // here even though the pre-check passed.
            if !coupon_repo::increment_use(&mut tx, coupon.id).await? {
                return Err(AppError::CouponIneligible(
                    CouponIneligibleReason::UsageLimitReached,
                ));
            }
            coupon_repo::insert_usage(&mut tx, coupon.id, user_id, order_id, discount_fils).await?;
        }

        tx.commit().await.map_err(map_sqlx)?;

        tracing::info!(
            order_id,
            invoice = %invoice_number,
            user_id,
            total_fils = total_price_fils,
            method = ?request.payment_method,
            "Order placed"
        );

        self.dispatcher
            .dispatch(NotificationEvent::OrderStatusChanged {
                order_id,
                user_id,
                old_status: OrderStatus::Pending,
                new_status: OrderStatus::Pending,
            })
            .await;
        if !flipped.is_empty() {
            self.dispatcher
                .dispatch(NotificationEvent::FabricCatalogChanged {
                    fabric_color_ids: flipped,
                })
                .await;
        }

        let order = order_repo::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| AppError::internal("Order vanished after placement"))?;
        let items = order_repo::list_items(&self.pool, order_id).await?;
        Ok(PlacedOrder { order, items })
    }
}

fn order_item_create(design: &UserDesign, item: &PlaceOrderItem) -> AppResult<OrderItemCreate> {
    let size_snapshot = serde_json::to_string(&item.size)
        .map_err(|e| AppError::validation(format!("Invalid size descriptor: {e}")))?;
    let components: serde_json::Map<String, serde_json::Value> = design
        .components()
        .iter()
        .filter_map(|(label, id)| id.map(|id| (label.to_string(), serde_json::json!(id))))
        .collect();
    let design_breakdown = serde_json::json!({
        "design_price": fils_to_kwd(design.price_fils),
        "components": components,
    })
    .to_string();

    Ok(OrderItemCreate {
        design_id: design.id,
        product_name: item.product_name.clone(),
        size_snapshot,
        unit_price_fils: design.price_fils,
        quantity: item.quantity,
        discount_percent: None,
        net_amount_fils: design.price_fils * item.quantity,
        design_breakdown,
    })
}

/// Discount in fils, or why the coupon is refused.
///
/// The global use cap is re-checked atomically inside the placement
/// transaction; this evaluation gives the fast, user-facing answer.
pub async fn evaluate_coupon(
    pool: &SqlitePool,
    coupon: &Coupon,
    user_id: i64,
    subtotal_fils: i64,
) -> AppResult<i64> {
    use CouponIneligibleReason::*;

    if !coupon.is_active {
        return Err(AppError::CouponIneligible(Inactive));
    }
    let now = now_millis();
    if coupon.valid_from.is_some_and(|from| now < from) {
        return Err(AppError::CouponIneligible(NotYetValid));
    }
    if coupon.valid_until.is_some_and(|until| now > until) {
        return Err(AppError::CouponIneligible(Expired));
    }
    if coupon.max_uses.is_some_and(|max| coupon.use_count >= max) {
        return Err(AppError::CouponIneligible(UsageLimitReached));
    }
    if let Some(per_user) = coupon.max_uses_per_user {
        let used = coupon_repo::count_uses_by_user(pool, coupon.id, user_id).await?;
        if used >= per_user {
            return Err(AppError::CouponIneligible(UserLimitReached));
        }
    }
    if subtotal_fils < coupon.min_order_fils {
        return Err(AppError::CouponIneligible(BelowMinimum));
    }

    let discount = match coupon.kind {
        CouponKind::Percentage => {
            let raw = percent_of(subtotal_fils, coupon.percent.unwrap_or(0));
            match coupon.max_discount_fils {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        CouponKind::Fixed => coupon.value_fils.unwrap_or(0),
    };
    // A discount never exceeds the goods value; delivery is not discounted.
    Ok(discount.min(subtotal_fils))
}

/// `INV-YYYYMMDD-NNNN`, random 4-digit suffix
fn generate_invoice_number() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("INV-{}-{:04}", today_yyyymmdd(), suffix)
}

fn map_sqlx(err: sqlx::Error) -> AppError {
    AppError::database(err.to_string())
}
