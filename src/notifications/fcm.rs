//! FCM Push Client
//!
//! 推送只做 best-effort：超时/失败记录日志即可，重试交给 FCM 自身。

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Push payload: localized EN/AR titles plus structured routing data so the
/// client can navigate without a follow-up fetch
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub title_en: String,
    pub body_en: String,
    pub title_ar: String,
    pub body_ar: String,
    /// `{ "type": ..., "order_id": ..., "status": ... }`
    pub data: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push network error: {0}")]
    Network(String),

    #[error("Push provider rejected: {0}")]
    Provider(String),
}

/// Seam for the push provider; mocked in tests
#[async_trait]
pub trait PushClient: Send + Sync {
    async fn send_to_token(&self, token: &str, message: &PushMessage) -> Result<(), PushError>;
    async fn send_to_topic(&self, topic: &str, message: &PushMessage) -> Result<(), PushError>;
}

/// FCM HTTP client
pub struct FcmClient {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl FcmClient {
    pub fn new(endpoint: impl Into<String>, server_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            server_key: server_key.into(),
        }
    }

    async fn send(&self, target: serde_json::Value, message: &PushMessage) -> Result<(), PushError> {
        let mut body = serde_json::json!({
            "notification": {
                "title": message.title_en,
                "body": message.body_en,
                "title_loc_key": message.title_ar,
                "body_loc_key": message.body_ar,
            },
            "data": message.data,
        });
        if let (Some(obj), Some(t)) = (body.as_object_mut(), target.as_object()) {
            for (k, v) in t {
                obj.insert(k.clone(), v.clone());
            }
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| PushError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PushError::Provider(format!("HTTP {}", resp.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl PushClient for FcmClient {
    async fn send_to_token(&self, token: &str, message: &PushMessage) -> Result<(), PushError> {
        self.send(serde_json::json!({ "to": token }), message).await
    }

    async fn send_to_topic(&self, topic: &str, message: &PushMessage) -> Result<(), PushError> {
        self.send(serde_json::json!({ "to": format!("/topics/{topic}") }), message)
            .await
    }
}
