//! Notification Log Model

use serde::{Deserialize, Serialize};

/// Outcome record for every push attempt; failures land here instead of
/// propagating to the caller
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub event_type: String,
    pub title: String,
    pub body: String,
    /// JSON data payload sent with the push
    pub data: Option<String>,
    pub was_sent: bool,
    pub error_message: Option<String>,
    pub created_at: i64,
}
