use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Notification signature does not match")]
    InvalidSignature,

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Gateway API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub first_name: String,
    pub email: String,
    pub phone: String,
}

/// Everything needed to open a hosted checkout for one consultation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub order_id: String,
    pub amount: i64,
    pub customer: Customer,
    pub item_id: String,
    pub item_name: String,
    pub finish_url: String,
    pub error_url: String,
    pub pending_url: String,
}

#[derive(Debug, Clone)]
pub struct SnapSession {
    pub token: String,
    pub redirect_url: String,
    pub raw: Value,
}

/// The gateway's view of a transaction, as reported by the status API.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionStatus {
    #[serde(default)]
    pub order_id: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_type: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &SessionRequest) -> Result<SnapSession, GatewayError>;
    async fn query_status(&self, order_id: &str) -> Result<TransactionStatus, GatewayError>;
    /// Authenticates a pushed notification and returns the authoritative status.
    async fn verify_notification(&self, payload: &Value) -> Result<TransactionStatus, GatewayError>;
}

// ==============================================================================
// MIDTRANS
// ==============================================================================

/// Midtrans Snap (sessions) and Core API (status) client.
#[derive(Clone)]
pub struct MidtransClient {
    client: Client,
    server_key: String,
    snap_url: String,
    api_url: String,
}

impl MidtransClient {
    pub fn new(config: &AppConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.outbound_timeout())
            .build()?;

        if !config.is_payment_configured() {
            warn!("Midtrans is not configured; payment operations will fail");
        }

        Ok(Self {
            client,
            server_key: config.midtrans_server_key.clone(),
            snap_url: config.midtrans_snap_url.trim_end_matches('/').to_string(),
            api_url: config.midtrans_api_url.trim_end_matches('/').to_string(),
        })
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.server_key.is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        Ok(())
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, GatewayError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("Midtrans error ({}): {}", status, body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    async fn create_session(&self, request: &SessionRequest) -> Result<SnapSession, GatewayError> {
        self.ensure_configured()?;
        let url = format!("{}/snap/v1/transactions", self.snap_url);
        debug!("Creating Snap transaction {}", request.order_id);

        let body = json!({
            "transaction_details": {
                "order_id": request.order_id,
                "gross_amount": request.amount,
            },
            "customer_details": {
                "first_name": request.customer.first_name,
                "email": request.customer.email,
                "phone": request.customer.phone,
            },
            "item_details": [{
                "id": request.item_id,
                "price": request.amount,
                "quantity": 1,
                "name": request.item_name,
                "category": "Medical Consultation",
            }],
            "callbacks": {
                "finish": request.finish_url,
                "error": request.error_url,
                "pending": request.pending_url,
            },
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.server_key, Some(""))
            .json(&body)
            .send()
            .await?;
        let raw = Self::read_json(response).await?;

        let field = |name: &str| {
            raw.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| GatewayError::Api {
                    status: 200,
                    body: format!("Snap response missing {}", name),
                })
        };

        Ok(SnapSession {
            token: field("token")?,
            redirect_url: field("redirect_url")?,
            raw,
        })
    }

    async fn query_status(&self, order_id: &str) -> Result<TransactionStatus, GatewayError> {
        self.ensure_configured()?;
        let url = format!("{}/v2/{}/status", self.api_url, order_id);
        debug!("Querying Midtrans status for {}", order_id);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.server_key, Some(""))
            .send()
            .await?;
        let raw = Self::read_json(response).await?;

        // Core API reports unknown orders in the body with HTTP 200.
        if raw.get("status_code").and_then(Value::as_str) == Some("404") {
            return Err(GatewayError::NotFound(order_id.to_string()));
        }

        let mut status: TransactionStatus = serde_json::from_value(raw.clone())?;
        if status.order_id.is_empty() {
            status.order_id = order_id.to_string();
        }
        status.raw = raw;
        Ok(status)
    }

    async fn verify_notification(&self, payload: &Value) -> Result<TransactionStatus, GatewayError> {
        self.ensure_configured()?;

        let text = |name: &str| payload.get(name).and_then(Value::as_str).unwrap_or_default();
        let order_id = text("order_id");
        if order_id.is_empty() {
            return Err(GatewayError::InvalidSignature);
        }

        let expected = notification_signature(
            order_id,
            text("status_code"),
            text("gross_amount"),
            &self.server_key,
        );
        let signature_matches: bool = expected.as_bytes().ct_eq(text("signature_key").as_bytes()).into();
        if !signature_matches {
            warn!("Rejected Midtrans notification for {} with bad signature", order_id);
            return Err(GatewayError::InvalidSignature);
        }

        self.query_status(order_id).await
    }
}

/// `SHA512(order_id + status_code + gross_amount + server_key)`, lowercase hex.
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
