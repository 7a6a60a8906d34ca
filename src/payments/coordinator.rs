//! Payment Coordinator
//!
//! 驱动 KNET 会话的生命周期：发起 → 客户跳转 → 回调核实 → 确认订单。
//!
//! 核心纪律：
//! - 网关 HTTP 调用永远不在数据库事务内
//! - 回调参数不可信，捕获与否一律以服务端 verify 结果为准
//! - `captured` 粘性：已捕获的支付不会被任何后续回调改写

use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::db::models::{Order, OrderStatus, Payment, PaymentStatus};
use crate::db::repository::{
    RepoError, order as order_repo, payment as payment_repo, user as user_repo,
};
use crate::db::repository::payment::PaymentCreate;
use crate::notifications::{NotificationDispatcher, NotificationEvent};
use crate::orders::state_machine::{Actor, OrderStateMachine};
use crate::payments::gateway::{PaymentGateway, SessionRequest, map_gateway_status};
use crate::utils::time::now_millis;
use crate::utils::{AppError, AppResult};

/// Redirect targets baked into every session; the gateway bounces the
/// customer's browser back through these
#[derive(Debug, Clone)]
pub struct PaymentUrls {
    pub success_url: String,
    pub error_url: String,
}

#[derive(Clone)]
pub struct PaymentCoordinator {
    pool: SqlitePool,
    gateway: Arc<dyn PaymentGateway>,
    machine: OrderStateMachine,
    dispatcher: NotificationDispatcher,
    urls: PaymentUrls,
}

impl PaymentCoordinator {
    pub fn new(
        pool: SqlitePool,
        gateway: Arc<dyn PaymentGateway>,
        machine: OrderStateMachine,
        dispatcher: NotificationDispatcher,
        urls: PaymentUrls,
    ) -> Self {
        Self {
            pool,
            gateway,
            machine,
            dispatcher,
            urls,
        }
    }

    /// Open a gateway session for a pending KNET order.
    ///
    /// Retrying after an abandoned attempt is clean: the stale pending
    /// session is dropped and a fresh `track_id` is allocated. An order
    /// with a captured payment refuses a second session outright.
    pub async fn initiate(&self, user_id: i64, order_id: i64) -> AppResult<Payment> {
        let order = self.load_owned_order(user_id, order_id).await?;

        if !matches!(order.status, OrderStatus::Pending) {
            return Err(AppError::conflict(format!(
                "Order {order_id} is {}, payment can only be initiated while pending",
                order.status
            )));
        }
        if order.payment_method.is_cash() {
            return Err(AppError::validation(
                "Cash orders are settled on delivery, not through the gateway",
            ));
        }
        if payment_repo::find_captured_by_order(&self.pool, order_id)
            .await?
            .is_some()
        {
            return Err(AppError::conflict(format!(
                "Order {order_id} already has a captured payment"
            )));
        }

        payment_repo::delete_pending_by_order(&self.pool, order_id).await?;

        let (customer_name, customer_email) = user_repo::find_contact(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))?;

        let track_id = generate_track_id();
        let idempotency_key = uuid::Uuid::new_v4().to_string();

        // Gateway first, row second: a crash between the two leaves an
        // orphan session at the gateway but no dangling local state.
        let session = self
            .gateway
            .create_session(&SessionRequest {
                track_id: track_id.clone(),
                invoice_number: order.invoice_number.clone(),
                amount_fils: order.total_price_fils,
                customer_name,
                customer_email,
                success_url: self.urls.success_url.clone(),
                error_url: self.urls.error_url.clone(),
            })
            .await
            .map_err(AppError::PaymentInit)?;

        let create = PaymentCreate {
            order_id,
            track_id: track_id.clone(),
            idempotency_key: idempotency_key.clone(),
            gateway_payment_id: Some(session.gateway_payment_id),
            amount_fils: order.total_price_fils,
            success_url: self.urls.success_url.clone(),
            error_url: self.urls.error_url.clone(),
            redirect_url: Some(session.redirect_url),
        };
        let payment = match payment_repo::insert(&self.pool, &create).await {
            Ok(payment) => payment,
            // Idempotency-key collision: hand back the already-created row
            Err(RepoError::Duplicate(_)) => payment_repo::find_by_idempotency_key(
                &self.pool,
                &idempotency_key,
            )
            .await?
            .ok_or_else(|| AppError::internal("Duplicate payment row not found"))?,
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            order_id,
            track_id = %payment.track_id,
            amount_fils = payment.amount_fils,
            "Payment session opened"
        );
        Ok(payment)
    }

    /// Gateway redirect landing. Always answers with a browser redirect
    /// URL; callback query parameters are never trusted, the status comes
    /// from a server-to-server verify.
    pub async fn handle_callback(&self, track_id: &str) -> AppResult<String> {
        let Some(payment) = payment_repo::find_by_track_id(&self.pool, track_id).await? else {
            // Unknown track id still gets a redirect, not an error page
            tracing::warn!(track_id, "Callback for unknown track id");
            return Ok(redirect_url(&self.urls.error_url, track_id, "error"));
        };

        // Re-entry on a settled payment: count the attempt, change nothing
        if payment.status == PaymentStatus::Captured {
            payment_repo::bump_verification_attempts(&self.pool, track_id).await?;
            return Ok(redirect_url(&payment.success_url, track_id, "paid"));
        }

        let payment = match self.verify_and_record(&payment).await {
            Ok(payment) => payment,
            Err(e) => {
                tracing::warn!(track_id, error = %e, "Callback verification failed");
                return Ok(redirect_url(&payment.error_url, track_id, "error"));
            }
        };

        let target = match payment.status {
            PaymentStatus::Captured => redirect_url(&payment.success_url, track_id, "paid"),
            PaymentStatus::Failed => redirect_url(&payment.error_url, track_id, "failed"),
            PaymentStatus::Pending => redirect_url(&payment.error_url, track_id, "pending"),
        };
        Ok(target)
    }

    /// Manual verification (app polling after the browser round trip)
    pub async fn verify(&self, user_id: i64, track_id: &str) -> AppResult<Payment> {
        let payment = self.find_owned(user_id, track_id).await?;
        if payment.status == PaymentStatus::Captured {
            payment_repo::bump_verification_attempts(&self.pool, track_id).await?;
            return payment_repo::find_by_track_id(&self.pool, track_id)
                .await?
                .ok_or_else(|| AppError::internal("Payment vanished after verification"));
        }
        self.verify_and_record(&payment).await
    }

    /// Payment lookup scoped to its owner
    pub async fn find_owned(&self, user_id: i64, track_id: &str) -> AppResult<Payment> {
        let payment = payment_repo::find_by_track_id(&self.pool, track_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment {track_id} not found")))?;
        self.load_owned_order(user_id, payment.order_id).await?;
        Ok(payment)
    }

    /// Ask the gateway, record the answer, and settle the order when the
    /// payment captured.
    async fn verify_and_record(&self, payment: &Payment) -> AppResult<Payment> {
        let verification = self
            .gateway
            .verify(&payment.track_id)
            .await
            .map_err(|e| AppError::PaymentVerifyFailed(e.to_string()))?;

        let status = map_gateway_status(&verification.raw_status);
        let recorded = payment_repo::record_verification(
            &self.pool,
            &payment.track_id,
            status,
            &verification.raw_status,
            verification.gateway_payment_id.as_deref(),
            verification.reference_code.as_deref(),
        )
        .await?;

        tracing::info!(
            track_id = %payment.track_id,
            raw = %verification.raw_status,
            status = %recorded.status,
            attempts = recorded.verification_attempts,
            "Payment verified with gateway"
        );

        match recorded.status {
            PaymentStatus::Captured => {
                let order = order_repo::find_by_id(&self.pool, payment.order_id)
                    .await?
                    .ok_or_else(|| AppError::internal("Order vanished under payment"))?;
                if order.status == OrderStatus::Pending {
                    self.machine
                        .transition(
                            order.id,
                            OrderStatus::Confirmed,
                            Actor::Gateway,
                            None,
                            None,
                        )
                        .await?;
                }
                self.dispatcher
                    .dispatch(NotificationEvent::PaymentSucceeded {
                        order_id: order.id,
                        user_id: order.user_id,
                        track_id: payment.track_id.clone(),
                    })
                    .await;
            }
            PaymentStatus::Failed => {
                let order = order_repo::find_by_id(&self.pool, payment.order_id)
                    .await?
                    .ok_or_else(|| AppError::internal("Order vanished under payment"))?;
                self.dispatcher
                    .dispatch(NotificationEvent::PaymentFailed {
                        order_id: order.id,
                        user_id: order.user_id,
                        track_id: payment.track_id.clone(),
                    })
                    .await;
            }
            PaymentStatus::Pending => {}
        }

        Ok(recorded)
    }

    /// Landing for malformed callbacks that carry no usable track id
    pub fn system_error_url(&self) -> String {
        let sep = if self.urls.error_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}status=error", self.urls.error_url)
    }

    async fn load_owned_order(&self, user_id: i64, order_id: i64) -> AppResult<Order> {
        order_repo::find_by_id(&self.pool, order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))
    }
}

/// `RAGY-{13-digit ms epoch}-{6 uppercase alnum}`
pub fn generate_track_id() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("RAGY-{:013}-{}", now_millis(), suffix)
}

fn redirect_url(base: &str, track_id: &str, status: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}trackid={track_id}&status={status}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PaymentMethod;
    use crate::db::test_support::{
        TestDb, seed_design, seed_fabric_color, seed_fabric_type, seed_user, setup,
    };
    use crate::notifications::test_support::MockPushClient;
    use crate::orders::placement::{
        AddressInput, PlaceOrderItem, PlaceOrderRequest, PlacementService, SizeDescriptor,
    };
    use crate::orders::state_machine::OrderLocks;
    use crate::payments::gateway::test_support::MockGateway;
    use dashmap::DashMap;

    struct Fixture {
        db: TestDb,
        coordinator: PaymentCoordinator,
        gateway: Arc<MockGateway>,
        user_id: i64,
        order_id: i64,
    }

    /// Pending KNET order (40.000 goods + 2.000 delivery) and a coordinator
    /// wired to a mock gateway
    async fn fixture() -> Fixture {
        let db = setup().await;
        let user_id = seed_user(&db.pool, "Bader", "customer").await;
        let ft = seed_fabric_type(&db.pool).await;
        let color = seed_fabric_color(&db.pool, ft, 5).await;
        let design_id = seed_design(&db.pool, user_id, Some(color), None, None, 40_000).await;

        let push = Arc::new(MockPushClient::default());
        let dispatcher = NotificationDispatcher::new(db.pool.clone(), push);
        let locks: OrderLocks = Arc::new(DashMap::new());
        let machine = OrderStateMachine::new(db.pool.clone(), locks, dispatcher.clone());

        let placed = PlacementService::new(db.pool.clone(), dispatcher.clone())
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
                        area: "Jabriya".into(),
                        block: Some("1".into()),
                        street: None,
                        house: None,
                        notes: None,
                    },
                    contact_name: "Bader".into(),
                    contact_phone: "+96550000003".into(),
                    payment_method: PaymentMethod::Knet,
                    coupon_code: None,
                },
            )
            .await
            .expect("place order");

        let gateway = Arc::new(MockGateway::default());
        let coordinator = PaymentCoordinator::new(
            db.pool.clone(),
            gateway.clone(),
            machine,
            dispatcher,
            PaymentUrls {
                success_url: "https://app.ragy.test/pay/success".into(),
                error_url: "https://app.ragy.test/pay/error".into(),
            },
        );

        Fixture {
            db,
            coordinator,
            gateway,
            user_id,
            order_id: placed.order.id,
        }
    }

    #[tokio::test]
    async fn initiate_opens_session_with_wire_amount() {
        let f = fixture().await;

        let payment = f.coordinator.initiate(f.user_id, f.order_id).await.unwrap();

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount_fils, 42_000);
        assert_eq!(payment.currency, "KWD");
        assert!(payment.track_id.starts_with("RAGY-"));
        assert!(payment.redirect_url.as_deref().unwrap().contains(&payment.track_id));

        let opened = f.gateway.sessions_opened.lock().unwrap();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].amount_fils, 42_000);
        // Customer identity rides along as UDF fields
        assert_eq!(opened[0].customer_name, "Bader");
        assert_eq!(opened[0].customer_email, "bader@test.local");
    }

    #[tokio::test]
    async fn retry_drops_the_stale_session() {
        let f = fixture().await;

        let first = f.coordinator.initiate(f.user_id, f.order_id).await.unwrap();
        let second = f.coordinator.initiate(f.user_id, f.order_id).await.unwrap();

        assert_ne!(first.track_id, second.track_id);
        // First session is gone; the fresh one is the only binding
        assert!(
            payment_repo::find_by_track_id(&f.db.pool, &first.track_id)
                .await
                .unwrap()
                .is_none()
        );
        let bound = payment_repo::find_by_order(&f.db.pool, f.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bound.track_id, second.track_id);
    }

    #[tokio::test]
    async fn gateway_failure_leaves_no_payment_row() {
        let f = fixture().await;
        *f.gateway.init_failure.lock().unwrap() =
            Some(crate::payments::gateway::GatewayError::Timeout);

        let err = f.coordinator.initiate(f.user_id, f.order_id).await.unwrap_err();
        assert!(matches!(err, AppError::PaymentInit(_)));
        assert!(
            payment_repo::find_by_order(&f.db.pool, f.order_id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn captured_callback_confirms_the_order() {
        let f = fixture().await;
        let payment = f.coordinator.initiate(f.user_id, f.order_id).await.unwrap();
        f.gateway.set_verify_status("CAPTURED");

        let redirect = f.coordinator.handle_callback(&payment.track_id).await.unwrap();
        assert!(redirect.starts_with("https://app.ragy.test/pay/success"));
        assert!(redirect.contains("status=paid"));

        let payment = payment_repo::find_by_track_id(&f.db.pool, &payment.track_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Captured);
        assert!(payment.verified_with_gateway);
        assert!(payment.completed_at.is_some());
        assert_eq!(payment.verification_attempts, 1);
        assert_eq!(payment.raw_gateway_status.as_deref(), Some("CAPTURED"));

        let order = order_repo::find_by_id(&f.db.pool, f.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn callback_replay_is_idempotent() {
        let f = fixture().await;
        let payment = f.coordinator.initiate(f.user_id, f.order_id).await.unwrap();

        f.coordinator.handle_callback(&payment.track_id).await.unwrap();
        // Gateway later answers something else; captured must stick
        f.gateway.set_verify_status("VOIDED");
        let redirect = f.coordinator.handle_callback(&payment.track_id).await.unwrap();
        assert!(redirect.contains("status=paid"));

        let payment = payment_repo::find_by_track_id(&f.db.pool, &payment.track_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Captured);
        assert_eq!(payment.verification_attempts, 2);
        // No second verify round trip for a settled payment
        assert_eq!(f.gateway.verifies.lock().unwrap().len(), 1);

        let order = order_repo::find_by_id(&f.db.pool, f.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn failed_statuses_mark_payment_failed_and_keep_order_pending() {
        let f = fixture().await;
        let payment = f.coordinator.initiate(f.user_id, f.order_id).await.unwrap();
        f.gateway.set_verify_status("NOT CAPTURED");

        let redirect = f.coordinator.handle_callback(&payment.track_id).await.unwrap();
        assert!(redirect.starts_with("https://app.ragy.test/pay/error"));
        assert!(redirect.contains("status=failed"));

        let payment = payment_repo::find_by_track_id(&f.db.pool, &payment.track_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.completed_at.is_none());

        // Order stays pending; customer may retry payment
        let order = order_repo::find_by_id(&f.db.pool, f.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_status_stays_pending() {
        let f = fixture().await;
        let payment = f.coordinator.initiate(f.user_id, f.order_id).await.unwrap();
        f.gateway.set_verify_status("INITIALIZED");

        let redirect = f.coordinator.handle_callback(&payment.track_id).await.unwrap();
        assert!(redirect.contains("status=pending"));

        let payment = payment_repo::find_by_track_id(&f.db.pool, &payment.track_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.verification_attempts, 1);
    }

    #[tokio::test]
    async fn unknown_track_id_still_redirects() {
        let f = fixture().await;
        let redirect = f
            .coordinator
            .handle_callback("RAGY-0000000000000-XXXXXX")
            .await
            .unwrap();
        assert!(redirect.starts_with("https://app.ragy.test/pay/error"));
        assert!(redirect.contains("status=error"));
        // No verify round trip for a track id we never issued
        assert!(f.gateway.verifies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_track_id_lands_on_system_error() {
        let f = fixture().await;
        assert_eq!(
            f.coordinator.system_error_url(),
            "https://app.ragy.test/pay/error?status=error"
        );
    }

    #[tokio::test]
    async fn initiate_refuses_cash_and_foreign_orders() {
        let f = fixture().await;
        let stranger = seed_user(&f.db.pool, "Stranger", "customer").await;
        let err = f.coordinator.initiate(stranger, f.order_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn second_session_after_capture_is_refused() {
        let f = fixture().await;
        let payment = f.coordinator.initiate(f.user_id, f.order_id).await.unwrap();
        f.coordinator.handle_callback(&payment.track_id).await.unwrap();

        let err = f.coordinator.initiate(f.user_id, f.order_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn track_id_shape() {
        let track = generate_track_id();
        let parts: Vec<&str> = track.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "RAGY");
        assert_eq!(parts[1].len(), 13);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6);
        assert!(
            parts[2]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }
}
