//! Order State Machine
//!
//! 订单状态是履约的唯一事实来源。所有转换经过这里：
//! 时间戳只写一次、取消时回补库存、提交后显式派发推送。
//!
//! # 转换表
//!
//! | From      | To                   | Actor |
//! |-----------|----------------------|-------|
//! | Pending   | Confirmed            | gateway (capture) / admin (cash) |
//! | Pending   | Cancelled            | customer / admin |
//! | Confirmed | Working              | admin |
//! | Confirmed | Cancelled            | customer / admin |
//! | Working   | Shipping             | admin |
//! | Working   | Cancelled            | admin (customer via request queue) |
//! | Shipping  | Delivered, Cancelled | admin |
//! | Delivered | —                    | terminal |
//! | Cancelled | —                    | terminal |

use dashmap::DashMap;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::models::{CancelledBy, Order, OrderStatus};
use crate::db::repository::{design as design_repo, order as order_repo};
use crate::inventory;
use crate::notifications::{NotificationDispatcher, NotificationEvent};
use crate::utils::{AppError, AppResult};

/// Per-order locks; transitions on one order never interleave
pub type OrderLocks = Arc<DashMap<i64, Arc<Mutex<()>>>>;

/// Who is driving a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer,
    Admin,
    Gateway,
}

/// Is `from -> to` legal for this actor?
pub fn is_allowed(from: OrderStatus, to: OrderStatus, actor: Actor) -> bool {
    use OrderStatus::*;
    match (from, to) {
        (Pending, Confirmed) => matches!(actor, Actor::Gateway | Actor::Admin),
        (Pending, Cancelled) => matches!(actor, Actor::Customer | Actor::Admin),
        (Confirmed, Working) => actor == Actor::Admin,
        (Confirmed, Cancelled) => matches!(actor, Actor::Customer | Actor::Admin),
        (Working, Shipping) => actor == Actor::Admin,
        // Customer cancellation of in-production orders goes through the
        // approval queue; only an admin lands the transition.
        (Working, Cancelled) => actor == Actor::Admin,
        (Shipping, Delivered) => actor == Actor::Admin,
        (Shipping, Cancelled) => actor == Actor::Admin,
        _ => false,
    }
}

#[derive(Clone)]
pub struct OrderStateMachine {
    pool: SqlitePool,
    locks: OrderLocks,
    dispatcher: NotificationDispatcher,
}

impl OrderStateMachine {
    pub fn new(pool: SqlitePool, locks: OrderLocks, dispatcher: NotificationDispatcher) -> Self {
        Self {
            pool,
            locks,
            dispatcher,
        }
    }

    /// Drive one transition.
    ///
    /// Side effects, in one transaction: destination timestamp written once
    /// (COALESCE), inventory restored when entering `Cancelled`. After
    /// commit: `order_status_changed` push, plus `fabric_catalog_changed`
    /// when a color came back in stock.
    pub async fn transition(
        &self,
        order_id: i64,
        to: OrderStatus,
        actor: Actor,
        cancelled_by: Option<CancelledBy>,
        reason: Option<&str>,
    ) -> AppResult<Order> {
        let lock = self
            .locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Designs are immutable; safe to read outside the transaction.
        let designs = if to == OrderStatus::Cancelled {
            design_repo::find_by_order(&self.pool, order_id).await?
        } else {
            Vec::new()
        };

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let order = order_repo::find_by_id_conn(&mut tx, order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;
        let from = order.status;

        if !is_allowed(from, to, actor) {
            return Err(AppError::IllegalTransition { from, to });
        }

        order_repo::apply_transition(&mut tx, order_id, to, cancelled_by, reason).await?;

        let mut flipped = Vec::new();
        if to == OrderStatus::Cancelled {
            for design in &designs {
                let outcome = inventory::restore(&mut tx, design, &order.invoice_number).await?;
                flipped.extend(outcome.stock_flipped);
            }
        }

        tx.commit().await.map_err(map_sqlx)?;

        tracing::info!(
            order_id,
            invoice = %order.invoice_number,
            from = %from,
            to = %to,
            "Order transitioned"
        );

        self.dispatcher
            .dispatch(NotificationEvent::OrderStatusChanged {
                order_id,
                user_id: order.user_id,
                old_status: from,
                new_status: to,
            })
            .await;
        if !flipped.is_empty() {
            self.dispatcher
                .dispatch(NotificationEvent::FabricCatalogChanged {
                    fabric_color_ids: flipped,
                })
                .await;
        }

        order_repo::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| AppError::internal("Order vanished after transition"))
    }
}

fn map_sqlx(err: sqlx::Error) -> AppError {
    AppError::database(err.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::models::PaymentMethod;
    use crate::db::repository::fabric_color as color_repo;
    use crate::db::test_support::{
        seed_design, seed_fabric_color, seed_fabric_type, seed_user, setup,
    };
    use crate::notifications::test_support::MockPushClient;
    use crate::orders::placement::{self, AddressInput, PlaceOrderItem, PlaceOrderRequest};
    use crate::orders::placement::SizeDescriptor;

    pub(crate) struct Fixture {
        pub db: crate::db::test_support::TestDb,
        pub machine: OrderStateMachine,
        pub push: Arc<MockPushClient>,
        pub user_id: i64,
        pub color_id: i64,
        pub order_id: i64,
    }

    /// One placed pending order with a single-color design (stock 5 -> 4)
    pub(crate) async fn fixture() -> Fixture {
        let db = setup().await;
        let user_id = seed_user(&db.pool, "Fatima", "customer").await;
        let ft = seed_fabric_type(&db.pool).await;
        let color_id = seed_fabric_color(&db.pool, ft, 5).await;
        let design_id = seed_design(&db.pool, user_id, Some(color_id), None, None, 10_000).await;

        let push = Arc::new(MockPushClient::default());
        let dispatcher = NotificationDispatcher::new(db.pool.clone(), push.clone());
        let locks: OrderLocks = Arc::new(DashMap::new());
        let machine = OrderStateMachine::new(db.pool.clone(), locks, dispatcher.clone());

        let service = placement::PlacementService::new(db.pool.clone(), dispatcher);
        let placed = service
            .place(
                user_id,
                PlaceOrderRequest {
                    items: vec![PlaceOrderItem {
                        design_id,
                        product_name: "Dishdasha".into(),
                        size: SizeDescriptor::Named("M".into()),
                        quantity: 1,
                    }],
                    address: AddressInput {
                        area: "Salmiya".into(),
                        block: Some("4".into()),
                        street: Some("Salem Al Mubarak".into()),
                        house: Some("12".into()),
                        notes: None,
                    },
                    contact_name: "Fatima".into(),
                    contact_phone: "+96550000001".into(),
                    payment_method: PaymentMethod::Cash,
                    coupon_code: None,
                },
            )
            .await
            .expect("place order");

        Fixture {
            machine,
            push,
            user_id,
            color_id,
            order_id: placed.order.id,
            db,
        }
    }

    #[tokio::test]
    async fn admin_confirms_cash_order() {
        let f = fixture().await;

        let order = f
            .machine
            .transition(f.order_id, OrderStatus::Confirmed, Actor::Admin, None, None)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.confirmed_at.is_some());
        assert!(order.pending_at.is_some());
        assert!(order.working_at.is_none());
        // No devices registered for this user, so nothing went out
        assert_eq!(f.push.sent_count(), 0);
    }

    #[tokio::test]
    async fn customer_cannot_drive_admin_transitions() {
        let f = fixture().await;

        let err = f
            .machine
            .transition(
                f.order_id,
                OrderStatus::Confirmed,
                Actor::Customer,
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::IllegalTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Confirmed
            }
        ));
    }

    #[tokio::test]
    async fn terminal_states_reject_transitions() {
        let f = fixture().await;

        f.machine
            .transition(
                f.order_id,
                OrderStatus::Cancelled,
                Actor::Admin,
                Some(CancelledBy::Admin),
                Some("out of fabric"),
            )
            .await
            .unwrap();

        let err = f
            .machine
            .transition(f.order_id, OrderStatus::Confirmed, Actor::Admin, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::IllegalTransition {
                from: OrderStatus::Cancelled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cancellation_restores_inventory_and_records_actor() {
        let f = fixture().await;
        // Placed order holds one unit: 5 -> 4
        assert_eq!(
            color_repo::find_by_id(&f.db.pool, f.color_id)
                .await
                .unwrap()
                .unwrap()
                .quantity,
            4
        );

        let order = f
            .machine
            .transition(
                f.order_id,
                OrderStatus::Cancelled,
                Actor::Customer,
                Some(CancelledBy::User),
                Some("changed my mind"),
            )
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.cancelled_by, Some(CancelledBy::User));
        assert_eq!(order.cancellation_reason.as_deref(), Some("changed my mind"));
        assert!(order.cancelled_at.is_some());
        assert_eq!(
            color_repo::find_by_id(&f.db.pool, f.color_id)
                .await
                .unwrap()
                .unwrap()
                .quantity,
            5
        );
    }

    #[tokio::test]
    async fn timestamps_are_never_overwritten() {
        let f = fixture().await;

        let confirmed = f
            .machine
            .transition(f.order_id, OrderStatus::Confirmed, Actor::Admin, None, None)
            .await
            .unwrap();
        let first_confirmed_at = confirmed.confirmed_at.unwrap();
        let first_pending_at = confirmed.pending_at.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let working = f
            .machine
            .transition(f.order_id, OrderStatus::Working, Actor::Admin, None, None)
            .await
            .unwrap();
        assert_eq!(working.confirmed_at, Some(first_confirmed_at));
        assert_eq!(working.pending_at, Some(first_pending_at));
        assert!(working.working_at.unwrap() >= first_confirmed_at);
        // Statuses never visited stay null
        assert!(working.shipping_at.is_none());
        assert!(working.delivered_at.is_none());
    }

    #[tokio::test]
    async fn full_happy_path_reaches_delivered() {
        let f = fixture().await;

        for (to, _) in [
            (OrderStatus::Confirmed, "confirmed"),
            (OrderStatus::Working, "working"),
            (OrderStatus::Shipping, "shipping"),
            (OrderStatus::Delivered, "delivered"),
        ] {
            f.machine
                .transition(f.order_id, to, Actor::Admin, None, None)
                .await
                .unwrap();
        }

        let order = order_repo::find_by_id(&f.db.pool, f.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Working,
            OrderStatus::Shipping,
            OrderStatus::Delivered,
        ] {
            assert!(order.status_timestamp(status).is_some());
        }
        assert!(order.cancelled_at.is_none());
    }
}
