//! Device Model (FCM registration)

use serde::{Deserialize, Serialize};

/// FCM registration bound to a user profile
///
/// Created/overwritten on login, cleared on logout.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: i64,
    pub user_id: i64,
    /// Opaque FCM token
    pub token: String,
    pub device_id: Option<String>,
    pub device_type: Option<String>,
    pub refreshed_at: i64,
}
