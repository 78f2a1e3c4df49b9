//! Razorpay REST client: order creation and refunds.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::AppError;

pub use crate::models::money::to_paise;

/// Gateway receipts are capped at 40 characters.
const MAX_RECEIPT_LEN: usize = 40;

/// Notes attached to a gateway order and echoed back in webhooks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotes {
    pub material_id: String,
    pub email: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a OrderNotes,
}

/// An order as returned by the gateway; handed to the checkout widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    #[serde(default)]
    pub entity: String,
    /// Amount in paise
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize)]
struct RefundRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<i64>,
    notes: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

/// Receipt for a new gateway order: `mat_{id tail}_{clock tail}`.
pub fn receipt_for(material_id: Uuid, now_millis: i64) -> String {
    let id = material_id.simple().to_string();
    let millis = now_millis.to_string();
    let receipt = format!("mat_{}_{}", tail(&id, 12), tail(&millis, 8));
    receipt.chars().take(MAX_RECEIPT_LEN).collect()
}

fn tail(s: &str, n: usize) -> &str {
    &s[s.len().saturating_sub(n)..]
}

/// Best description of a failed gateway call.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope
            .error
            .description
            .or(envelope.error.code)
            .unwrap_or_else(|| format!("Gateway returned {}", status)),
        Err(_) if body.trim().is_empty() => format!("Gateway returned {}", status),
        Err(_) => body.to_string(),
    }
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig, client: Client) -> Self {
        Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Public key id, handed to the browser checkout widget.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Secret used to sign checkout callbacks.
    pub fn key_secret(&self) -> &str {
        &self.key_secret
    }

    pub async fn create_order(
        &self,
        amount_paise: i64,
        currency: &str,
        receipt: &str,
        notes: &OrderNotes,
    ) -> Result<GatewayOrder, AppError> {
        let body = CreateOrderRequest {
            amount: amount_paise,
            currency,
            receipt,
            notes,
        };
        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("Error creating order: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::PaymentGateway(error_message(status, &text)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("Failed to parse gateway order: {}", e)))
    }

    /// Refunds a payment, fully when `amount_paise` is `None`.
    pub async fn refund(
        &self,
        payment_id: &str,
        amount_paise: Option<i64>,
        notes: Value,
    ) -> Result<Value, AppError> {
        let response = self
            .client
            .post(format!("{}/payments/{}/refund", self.base_url, payment_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&RefundRequest {
                amount: amount_paise,
                notes,
            })
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("Error processing refund: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::PaymentGateway(error_message(status, &text)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("Failed to parse refund: {}", e)))
    }
}
