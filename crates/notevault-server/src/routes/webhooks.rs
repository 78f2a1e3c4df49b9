//! Payment gateway webhooks.
//!
//! The webhook is the fallback path for orders whose checkout callback
//! never reached us (closed tab, network drop). It can also race the
//! callback; the unique payment id settles who records the order.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewOrder, OrderStatus};
use crate::purchase::{record_paid_order, DUPLICATE_PAYMENT};
use crate::routes::materials::find_material;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<PaymentWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentWrapper {
    pub entity: PaymentEntity,
}

/// The parts of a gateway payment entity we act on.
#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    /// An object of strings, or an empty array when no notes were set.
    #[serde(default)]
    pub notes: Value,
}

impl PaymentEntity {
    fn note(&self, key: &str) -> Option<&str> {
        self.notes
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Buyer email: the checkout notes first, then the gateway's record.
    pub fn buyer_email(&self) -> Option<&str> {
        self.note("email")
            .or(self.email.as_deref().filter(|e| !e.is_empty()))
    }

    pub fn buyer_mobile(&self) -> Option<&str> {
        self.note("mobile")
            .or(self.contact.as_deref().filter(|c| !c.is_empty()))
    }

    pub fn material_id(&self) -> Option<Uuid> {
        self.note("materialId").and_then(|id| Uuid::parse_str(id).ok())
    }
}

/// Checks the signature over the raw body and parses the event.
pub fn authenticate(
    headers: &HeaderMap,
    secret: Option<&str>,
    body: &[u8],
) -> Result<WebhookEvent, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty());

    let (Some(signature), Some(secret)) = (signature, secret) else {
        tracing::warn!("Webhook signature or secret missing");
        return Err(AppError::BadRequest(
            "Missing signature or secret".to_string(),
        ));
    };

    if notevault_crypto::verify_webhook_signature(secret, body, signature).is_err() {
        tracing::warn!("Invalid webhook signature");
        return Err(AppError::BadRequest("Invalid signature".to_string()));
    }

    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))
}

/// Creates the webhooks router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/razorpay", post(razorpay_webhook))
        .with_state(state)
}

/// POST /api/webhooks/razorpay
async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let event = authenticate(&headers, state.config.webhook_secret.as_deref(), &body)?;
    tracing::info!(event = %event.event, "Gateway webhook received");

    let payment = event.payload.payment.map(|p| p.entity);
    match (event.event.as_str(), payment) {
        ("payment.captured", Some(payment)) => payment_captured(&state, &payment).await?,
        ("payment.refunded", Some(payment)) => payment_refunded(&state, &payment).await?,
        (other, _) => tracing::debug!(event = %other, "Ignoring webhook event"),
    }

    Ok(Json(json!({ "success": true, "message": "Webhook processed" })))
}

async fn payment_captured(state: &AppState, payment: &PaymentEntity) -> Result<(), AppError> {
    let existing: Option<(Uuid, OrderStatus)> =
        sqlx::query_as("SELECT id, status FROM orders WHERE payment_id = $1")
            .bind(&payment.id)
            .fetch_optional(&state.pool)
            .await?;

    if let Some((order_id, status)) = existing {
        // Refunds are final; only a failed order is revived by a capture.
        if status == OrderStatus::Failed {
            sqlx::query("UPDATE orders SET status = 'captured' WHERE id = $1")
                .bind(order_id)
                .execute(&state.pool)
                .await?;
            tracing::info!(order_id = %order_id, "Order marked captured from webhook");
        }
        return Ok(());
    }

    let Some(material_id) = payment.material_id() else {
        tracing::warn!(payment_id = %payment.id, "Captured payment without a material reference");
        return Ok(());
    };

    let material = match find_material(state, material_id).await {
        Ok(material) => material,
        Err(AppError::NotFound(_)) => {
            tracing::warn!(payment_id = %payment.id, material_id = %material_id, "Captured payment for unknown material");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let new_order = NewOrder::new(
        payment.id.clone(),
        payment.order_id.clone(),
        material.id,
        payment.buyer_email().unwrap_or_default(),
        payment.buyer_mobile().map(str::to_string),
        material.price_inr.clone(),
    );

    match record_paid_order(&state.pool, &new_order).await {
        Ok(order) => {
            tracing::info!(order_id = %order.id, "Order created from webhook");
            Ok(())
        }
        Err(AppError::BadRequest(msg)) if msg == DUPLICATE_PAYMENT => {
            tracing::info!(payment_id = %payment.id, "Payment already recorded by checkout");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn payment_refunded(state: &AppState, payment: &PaymentEntity) -> Result<(), AppError> {
    let updated: Option<(Uuid,)> = sqlx::query_as(
        "UPDATE orders SET status = 'refunded' WHERE payment_id = $1 AND status <> 'refunded' RETURNING id",
    )
    .bind(&payment.id)
    .fetch_optional(&state.pool)
    .await?;

    if let Some((order_id,)) = updated {
        tracing::info!(order_id = %order_id, "Order refunded from webhook");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "whsec";

    fn signed(body: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&notevault_crypto::webhook_signature(SECRET, body.as_bytes()))
                .unwrap(),
        );
        headers
    }

    const CAPTURED: &str = r#"{
        "event": "payment.captured",
        "payload": {"payment": {"entity": {
            "id": "pay_1", "order_id": "order_1", "email": "gw@example.com",
            "contact": "+919999999999",
            "notes": {"materialId": "550e8400-e29b-41d4-a716-446655440000", "email": "Buyer@Example.com", "mobile": ""}
        }}}
    }"#;

    #[test]
    fn test_authenticate_accepts_signed_body() {
        let event = authenticate(&signed(CAPTURED), Some(SECRET), CAPTURED.as_bytes()).unwrap();
        assert_eq!(event.event, "payment.captured");
        let payment = event.payload.payment.unwrap().entity;
        assert_eq!(payment.id, "pay_1");
        assert_eq!(payment.buyer_email(), Some("Buyer@Example.com"));
        assert_eq!(payment.buyer_mobile(), Some("+919999999999"));
        assert_eq!(
            payment.material_id(),
            Some(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap())
        );
    }

    #[test]
    fn test_authenticate_rejects_missing_or_bad_signature() {
        let body = CAPTURED.as_bytes();
        assert!(matches!(
            authenticate(&HeaderMap::new(), Some(SECRET), body),
            Err(AppError::BadRequest(m)) if m == "Missing signature or secret"
        ));
        assert!(matches!(
            authenticate(&signed(CAPTURED), None, body),
            Err(AppError::BadRequest(m)) if m == "Missing signature or secret"
        ));
        assert!(matches!(
            authenticate(&signed("{}"), Some(SECRET), body),
            Err(AppError::BadRequest(m)) if m == "Invalid signature"
        ));
    }

    #[test]
    fn test_authenticate_rejects_invalid_json() {
        let body = "not json";
        assert!(matches!(
            authenticate(&signed(body), Some(SECRET), body.as_bytes()),
            Err(AppError::BadRequest(m)) if m.starts_with("Invalid webhook payload")
        ));
    }

    #[test]
    fn test_empty_notes_array() {
        let payment: PaymentEntity = serde_json::from_str(
            r#"{"id": "pay_2", "email": "gw@example.com", "notes": []}"#,
        )
        .unwrap();
        assert_eq!(payment.material_id(), None);
        assert_eq!(payment.buyer_email(), Some("gw@example.com"));
        assert_eq!(payment.buyer_mobile(), None);
    }

    #[test]
    fn test_events_without_payment_parse() {
        let event: WebhookEvent =
            serde_json::from_str(r#"{"event": "order.paid", "payload": {}}"#).unwrap();
        assert!(event.payload.payment.is_none());
    }
}
