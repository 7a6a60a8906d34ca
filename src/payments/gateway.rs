//! KNET Payment Gateway Client
//!
//! 网关只认字符串金额（三位小数）与 `track_id`。HTTP 调用永远不在
//! 数据库事务内发生。
//!
//! # 状态映射
//!
//! | 网关原始状态 | 本地状态 |
//! |---|---|
//! | `CAPTURED` | `captured` |
//! | `VOIDED` / `NOT CAPTURED` / `CANCELED` / `DENIED BY RISK` / `HOST TIMEOUT` | `failed` |
//! | 其他 | `pending` (留待人工/重试核实) |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::db::models::PaymentStatus;
use crate::utils::money::format_kwd;

/// Hard ceiling on the session-creation round trip
pub const INIT_TIMEOUT: Duration = Duration::from_secs(30);
/// Hard ceiling on a verification round trip
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway network error: {0}")]
    Network(String),

    #[error("Gateway timed out")]
    Timeout,

    #[error("Gateway rejected the request: {0}")]
    Rejected(String),
}

impl GatewayError {
    /// Stable machine-readable kind for the error payload
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Network(_) => "network",
            GatewayError::Timeout => "timeout",
            GatewayError::Rejected(_) => "rejected-by-gateway",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

/// What the coordinator sends when opening a session
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub track_id: String,
    pub invoice_number: String,
    pub amount_fils: i64,
    /// Forwarded as UDF fields; shown on the gateway's merchant portal
    pub customer_name: String,
    pub customer_email: String,
    pub success_url: String,
    pub error_url: String,
}

/// An open gateway session the customer gets redirected into
#[derive(Debug, Clone)]
pub struct GatewaySession {
    pub gateway_payment_id: String,
    pub redirect_url: String,
}

/// Raw verification answer; mapping to [`PaymentStatus`] happens locally
#[derive(Debug, Clone)]
pub struct GatewayVerification {
    pub raw_status: String,
    pub gateway_payment_id: Option<String>,
    pub reference_code: Option<String>,
}

/// Seam for the payment provider; mocked in tests
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &SessionRequest)
    -> Result<GatewaySession, GatewayError>;
    async fn verify(&self, track_id: &str) -> Result<GatewayVerification, GatewayError>;
}

/// Map the gateway's raw status string to the local settlement status.
/// Unknown strings stay `pending` rather than guessing a terminal state.
pub fn map_gateway_status(raw: &str) -> PaymentStatus {
    match raw.trim().to_ascii_uppercase().as_str() {
        "CAPTURED" => PaymentStatus::Captured,
        "VOIDED" | "NOT CAPTURED" | "CANCELED" | "DENIED BY RISK" | "HOST TIMEOUT" => {
            PaymentStatus::Failed
        }
        _ => PaymentStatus::Pending,
    }
}

// ========== HTTP wire types ==========

#[derive(Debug, Serialize)]
struct CreateSessionBody<'a> {
    trackid: &'a str,
    /// Three-decimal KWD string, e.g. "40.000"
    amount: String,
    currency: &'static str,
    udf1: &'a str,
    udf2: &'a str,
    udf3: &'a str,
    success_url: &'a str,
    error_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    payment_id: String,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    result: String,
    payment_id: Option<String>,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

/// KNET HTTP client
pub struct KnetGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl KnetGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for KnetGateway {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<GatewaySession, GatewayError> {
        let body = CreateSessionBody {
            trackid: &request.track_id,
            amount: format_kwd(request.amount_fils),
            currency: "KWD",
            udf1: &request.invoice_number,
            udf2: &request.customer_name,
            udf3: &request.customer_email,
            success_url: &request.success_url,
            error_url: &request.error_url,
        };

        let resp = self
            .client
            .post(format!("{}/payments", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(INIT_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("HTTP {status}: {text}")));
        }

        let session: CreateSessionResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Network(format!("Malformed gateway response: {e}")))?;
        Ok(GatewaySession {
            gateway_payment_id: session.payment_id,
            redirect_url: session.redirect_url,
        })
    }

    async fn verify(&self, track_id: &str) -> Result<GatewayVerification, GatewayError> {
        let resp = self
            .client
            .get(format!("{}/payments/{track_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("HTTP {status}: {text}")));
        }

        let verification: VerifyResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Network(format!("Malformed gateway response: {e}")))?;
        Ok(GatewayVerification {
            raw_status: verification.result,
            gateway_payment_id: verification.payment_id,
            reference_code: verification.reference,
        })
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Programmable in-memory gateway
    pub struct MockGateway {
        /// Error the next `create_session` returns, if set
        pub init_failure: Mutex<Option<GatewayError>>,
        /// Raw status `verify` answers with
        pub verify_status: Mutex<String>,
        pub sessions_opened: Mutex<Vec<SessionRequest>>,
        pub verifies: Mutex<Vec<String>>,
    }

    impl Default for MockGateway {
        fn default() -> Self {
            Self {
                init_failure: Mutex::new(None),
                verify_status: Mutex::new("CAPTURED".to_string()),
                sessions_opened: Mutex::new(Vec::new()),
                verifies: Mutex::new(Vec::new()),
            }
        }
    }

    impl MockGateway {
        pub fn answering(raw_status: &str) -> Self {
            Self {
                verify_status: Mutex::new(raw_status.to_string()),
                ..Self::default()
            }
        }

        pub fn set_verify_status(&self, raw_status: &str) {
            *self.verify_status.lock().unwrap() = raw_status.to_string();
        }
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn create_session(
            &self,
            request: &SessionRequest,
        ) -> Result<GatewaySession, GatewayError> {
            if let Some(err) = self.init_failure.lock().unwrap().take() {
                return Err(err);
            }
            self.sessions_opened.lock().unwrap().push(request.clone());
            Ok(GatewaySession {
                gateway_payment_id: format!("PAY-{}", request.track_id),
                redirect_url: format!("https://kpay.test/session/{}", request.track_id),
            })
        }

        async fn verify(&self, track_id: &str) -> Result<GatewayVerification, GatewayError> {
            self.verifies.lock().unwrap().push(track_id.to_string());
            let raw = self.verify_status.lock().unwrap().clone();
            Ok(GatewayVerification {
                raw_status: raw,
                gateway_payment_id: Some(format!("PAY-{track_id}")),
                reference_code: Some("202608290001".to_string()),
            })
        }
    }
}
