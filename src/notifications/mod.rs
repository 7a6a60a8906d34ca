//! Notification Dispatcher
//!
//! 状态机/支付协调器在事务提交后显式调用这里，无 ORM 钩子。
//! 推送失败永远不会阻塞订单流程：结果写入 `notification_log` 即止。

pub mod fcm;

pub use fcm::{FcmClient, PushClient, PushError, PushMessage};

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::db::models::OrderStatus;
use crate::db::repository::{device, notification};

/// Topic used for the catalog cache-bust broadcast
const CATALOG_TOPIC: &str = "catalog";

/// Events the core emits
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    OrderStatusChanged {
        order_id: i64,
        user_id: i64,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    PaymentSucceeded {
        order_id: i64,
        user_id: i64,
        track_id: String,
    },
    PaymentFailed {
        order_id: i64,
        user_id: i64,
        track_id: String,
    },
    /// Stock state of one or more fabric colors flipped; surrounding system
    /// uses this to invalidate its catalog cache
    FabricCatalogChanged { fabric_color_ids: Vec<i64> },
}

impl NotificationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::OrderStatusChanged { .. } => "order_status_changed",
            NotificationEvent::PaymentSucceeded { .. } => "payment_succeeded",
            NotificationEvent::PaymentFailed { .. } => "payment_failed",
            NotificationEvent::FabricCatalogChanged { .. } => "fabric_catalog_changed",
        }
    }

    fn target_user(&self) -> Option<i64> {
        match self {
            NotificationEvent::OrderStatusChanged { user_id, .. }
            | NotificationEvent::PaymentSucceeded { user_id, .. }
            | NotificationEvent::PaymentFailed { user_id, .. } => Some(*user_id),
            NotificationEvent::FabricCatalogChanged { .. } => None,
        }
    }

    fn message(&self) -> PushMessage {
        match self {
            NotificationEvent::OrderStatusChanged {
                order_id,
                new_status,
                ..
            } => {
                let (body_en, body_ar) = status_bodies(*new_status);
                PushMessage {
                    title_en: "Order update".to_string(),
                    title_ar: "تحديث الطلب".to_string(),
                    body_en,
                    body_ar,
                    data: serde_json::json!({
                        "type": self.event_type(),
                        "order_id": order_id,
                        "status": new_status,
                    }),
                }
            }
            NotificationEvent::PaymentSucceeded {
                order_id, track_id, ..
            } => PushMessage {
                title_en: "Payment received".to_string(),
                title_ar: "تم استلام الدفعة".to_string(),
                body_en: "Your payment was received and your order is confirmed.".to_string(),
                body_ar: "تم استلام دفعتك وتأكيد طلبك.".to_string(),
                data: serde_json::json!({
                    "type": self.event_type(),
                    "order_id": order_id,
                    "track_id": track_id,
                }),
            },
            NotificationEvent::PaymentFailed {
                order_id, track_id, ..
            } => PushMessage {
                title_en: "Payment failed".to_string(),
                title_ar: "فشلت عملية الدفع".to_string(),
                body_en: "Your payment could not be completed. Please try again.".to_string(),
                body_ar: "تعذر إتمام عملية الدفع. يرجى المحاولة مرة أخرى.".to_string(),
                data: serde_json::json!({
                    "type": self.event_type(),
                    "order_id": order_id,
                    "track_id": track_id,
                }),
            },
            NotificationEvent::FabricCatalogChanged { fabric_color_ids } => PushMessage {
                title_en: "Catalog updated".to_string(),
                title_ar: "تم تحديث الكتالوج".to_string(),
                body_en: "Fabric availability changed.".to_string(),
                body_ar: "تغير توفر الأقمشة.".to_string(),
                data: serde_json::json!({
                    "type": self.event_type(),
                    "fabric_color_ids": fabric_color_ids,
                }),
            },
        }
    }
}

fn status_bodies(status: OrderStatus) -> (String, String) {
    let (en, ar) = match status {
        OrderStatus::Pending => ("Your order was placed.", "تم تقديم طلبك."),
        OrderStatus::Confirmed => ("Your order is confirmed.", "تم تأكيد طلبك."),
        OrderStatus::Working => ("Your order is being tailored.", "جاري تفصيل طلبك."),
        OrderStatus::Shipping => ("Your order is on the way.", "طلبك في الطريق."),
        OrderStatus::Delivered => ("Your order was delivered.", "تم توصيل طلبك."),
        OrderStatus::Cancelled => ("Your order was cancelled.", "تم إلغاء طلبك."),
    };
    (en.to_string(), ar.to_string())
}

/// Observes state changes and fans out to the push provider
#[derive(Clone)]
pub struct NotificationDispatcher {
    pool: SqlitePool,
    push: Arc<dyn PushClient>,
}

impl NotificationDispatcher {
    pub fn new(pool: SqlitePool, push: Arc<dyn PushClient>) -> Self {
        Self { pool, push }
    }

    /// Dispatch one event. Infallible by contract: provider and storage
    /// failures are logged and swallowed.
    pub async fn dispatch(&self, event: NotificationEvent) {
        let message = event.message();
        let data_json = message.data.to_string();

        match event.target_user() {
            Some(user_id) => {
                let tokens = match device::list_tokens(&self.pool, user_id).await {
                    Ok(tokens) => tokens,
                    Err(e) => {
                        tracing::warn!(user_id, error = %e, "Failed to load device tokens");
                        return;
                    }
                };

                if tokens.is_empty() {
                    self.log(
                        Some(user_id),
                        &event,
                        &message,
                        &data_json,
                        false,
                        Some("No registered devices"),
                    )
                    .await;
                    return;
                }

                // Concurrent fan-out; one logbook row per attempt
                let sends = tokens
                    .iter()
                    .map(|token| self.push.send_to_token(token, &message));
                let results = futures::future::join_all(sends).await;

                for result in results {
                    let (sent, error) = match &result {
                        Ok(()) => (true, None),
                        Err(e) => {
                            tracing::warn!(
                                user_id,
                                event = event.event_type(),
                                error = %e,
                                "Push delivery failed"
                            );
                            (false, Some(e.to_string()))
                        }
                    };
                    self.log(
                        Some(user_id),
                        &event,
                        &message,
                        &data_json,
                        sent,
                        error.as_deref(),
                    )
                    .await;
                }
            }
            None => {
                let result = self.push.send_to_topic(CATALOG_TOPIC, &message).await;
                let (sent, error) = match &result {
                    Ok(()) => (true, None),
                    Err(e) => (false, Some(e.to_string())),
                };
                self.log(None, &event, &message, &data_json, sent, error.as_deref())
                    .await;
            }
        }
    }

    async fn log(
        &self,
        user_id: Option<i64>,
        event: &NotificationEvent,
        message: &PushMessage,
        data_json: &str,
        was_sent: bool,
        error: Option<&str>,
    ) {
        if let Err(e) = notification::insert(
            &self.pool,
            user_id,
            event.event_type(),
            &message.title_en,
            &message.body_en,
            Some(data_json),
            was_sent,
            error,
        )
        .await
        {
            tracing::warn!(error = %e, "Failed to write notification log");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::MockPushClient;
    use super::*;
    use crate::db::repository::notification as notification_repo;
    use crate::db::test_support::{seed_device, seed_user, setup};

    #[tokio::test]
    async fn dispatch_fans_out_to_all_devices() {
        let db = setup().await;
        let user = seed_user(&db.pool, "Noura", "customer").await;
        seed_device(&db.pool, user, "token-1").await;
        seed_device(&db.pool, user, "token-2").await;

        let push = Arc::new(MockPushClient::default());
        let dispatcher = NotificationDispatcher::new(db.pool.clone(), push.clone());

        dispatcher
            .dispatch(NotificationEvent::OrderStatusChanged {
                order_id: 9,
                user_id: user,
                old_status: OrderStatus::Pending,
                new_status: OrderStatus::Confirmed,
            })
            .await;

        assert_eq!(push.sent_count(), 2);
        let log = notification_repo::list_recent(&db.pool, 10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|l| l.was_sent));
        assert_eq!(log[0].event_type, "order_status_changed");
    }

    #[tokio::test]
    async fn push_failure_is_logged_not_raised() {
        let db = setup().await;
        let user = seed_user(&db.pool, "Yousef", "customer").await;
        seed_device(&db.pool, user, "token-1").await;

        let push = Arc::new(MockPushClient::failing());
        let dispatcher = NotificationDispatcher::new(db.pool.clone(), push);

        // Must not panic or return an error
        dispatcher
            .dispatch(NotificationEvent::PaymentFailed {
                order_id: 4,
                user_id: user,
                track_id: "RAGY-1-ABCDEF".into(),
            })
            .await;

        let log = notification_repo::list_recent(&db.pool, 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert!(!log[0].was_sent);
        assert!(log[0].error_message.as_deref().unwrap().contains("simulated"));
    }

    #[tokio::test]
    async fn catalog_change_broadcasts_to_topic() {
        let db = setup().await;
        let push = Arc::new(MockPushClient::default());
        let dispatcher = NotificationDispatcher::new(db.pool.clone(), push.clone());

        dispatcher
            .dispatch(NotificationEvent::FabricCatalogChanged {
                fabric_color_ids: vec![3, 5],
            })
            .await;

        let sent = push.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "/topics/catalog");
    }

    #[tokio::test]
    async fn no_devices_logs_unsent() {
        let db = setup().await;
        let user = seed_user(&db.pool, "Ghalia", "customer").await;

        let push = Arc::new(MockPushClient::default());
        let dispatcher = NotificationDispatcher::new(db.pool.clone(), push.clone());

        dispatcher
            .dispatch(NotificationEvent::PaymentSucceeded {
                order_id: 1,
                user_id: user,
                track_id: "RAGY-1-ABCDEF".into(),
            })
            .await;

        assert_eq!(push.sent_count(), 0);
        let log = notification_repo::list_recent(&db.pool, 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert!(!log[0].was_sent);
    }
}
