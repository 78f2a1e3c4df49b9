//! Checkout endpoints: free claims, gateway order creation and payment
//! verification.

use axum::{extract::State, middleware, routing::post, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::gateway::{receipt_for, to_paise, GatewayClient, OrderNotes};
use crate::models::{NewDownload, NewOrder};
use crate::purchase::{paid_download_path, record_free_download, record_paid_order};
use crate::rate_limit::checkout_rate_limit;
use crate::recaptcha::verify_recaptcha;
use crate::routes::materials::{find_material, material_id};
use crate::state::AppState;

const GATEWAY_NOT_CONFIGURED: &str = "Payment gateway not configured. Please contact administrator.";

/// Request body shared by the free and create-order endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub material_id: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub recaptcha_token: Option<String>,
}

/// Checkout callback payload. The gateway fields keep the widget's names.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    #[serde(rename = "materialId")]
    pub material_id: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    #[serde(rename = "recaptchaToken")]
    pub recaptcha_token: Option<String>,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn gateway(state: &AppState) -> Result<&GatewayClient, AppError> {
    state
        .gateway
        .as_ref()
        .ok_or_else(|| AppError::PaymentGateway(GATEWAY_NOT_CONFIGURED.to_string()))
}

/// Creates the checkout router. Every route is rate limited per client IP.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/free", post(free_checkout))
        .route("/create-order", post(create_order))
        .route("/verify", post(verify_payment))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            checkout_rate_limit,
        ))
        .with_state(state)
}

/// POST /api/checkout/free
async fn free_checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    verify_recaptcha(&state, req.recaptcha_token.as_deref()).await?;

    let (Some(raw_id), Some(email)) = (required(&req.material_id), required(&req.email)) else {
        return Err(AppError::BadRequest(
            "Material ID and email are required".to_string(),
        ));
    };

    let material = find_material(&state, material_id(raw_id)?).await?;
    if !material.is_free() {
        return Err(AppError::BadRequest("This is a paid material".to_string()));
    }

    let download = NewDownload::free(material.id, email, req.mobile.clone());
    record_free_download(&state.pool, &download).await?;

    tracing::info!(material_id = %material.id, "Free material claimed");

    Ok(Json(json!({
        "success": true,
        "downloadUrl": state.public_url(&format!("/api/download/free/{}", material.id)),
        "message": "Free material downloaded successfully",
    })))
}

/// POST /api/checkout/create-order
async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    verify_recaptcha(&state, req.recaptcha_token.as_deref()).await?;

    let (Some(raw_id), Some(email)) = (required(&req.material_id), required(&req.email)) else {
        return Err(AppError::BadRequest(
            "Material ID and email are required".to_string(),
        ));
    };

    let material = find_material(&state, material_id(raw_id)?).await?;
    if material.is_free() {
        return Err(AppError::BadRequest("This is a free material".to_string()));
    }

    let gateway = gateway(&state)?;
    let amount = to_paise(&material.price_inr)
        .ok_or_else(|| AppError::Internal(format!("Unrepresentable price for {}", material.id)))?;
    let receipt = receipt_for(material.id, Utc::now().timestamp_millis());
    let notes = OrderNotes {
        material_id: material.id.to_string(),
        email: email.to_string(),
        mobile: req.mobile.clone().unwrap_or_default(),
        title: material.title.clone(),
    };

    let order = gateway.create_order(amount, "INR", &receipt, &notes).await?;

    tracing::info!(
        material_id = %material.id,
        gateway_order_id = %order.id,
        amount_paise = amount,
        "Gateway order created"
    );

    Ok(Json(json!({
        "success": true,
        "order": order,
        "key": gateway.key_id(),
    })))
}

/// POST /api/checkout/verify
async fn verify_payment(
    State(state): State<AppState>,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    verify_recaptcha(&state, req.recaptcha_token.as_deref()).await?;

    let (Some(order_id), Some(payment_id), Some(signature), Some(raw_id)) = (
        required(&req.razorpay_order_id),
        required(&req.razorpay_payment_id),
        required(&req.razorpay_signature),
        required(&req.material_id),
    ) else {
        return Err(AppError::BadRequest("Missing payment details".to_string()));
    };

    let gateway = gateway(&state)?;
    if notevault_crypto::verify_checkout_signature(
        gateway.key_secret(),
        order_id,
        payment_id,
        signature,
    )
    .is_err()
    {
        tracing::warn!(payment_id = %payment_id, "Checkout signature mismatch");
        return Err(AppError::BadRequest("Invalid payment signature".to_string()));
    }

    let material = find_material(&state, material_id(raw_id)?).await?;

    let new_order = NewOrder::new(
        payment_id.to_string(),
        Some(order_id.to_string()),
        material.id,
        req.email.as_deref().unwrap_or_default(),
        req.mobile.clone(),
        material.price_inr.clone(),
    );
    let order = record_paid_order(&state.pool, &new_order).await?;

    let path = paid_download_path(&state.config, order.id, Utc::now());

    Ok(Json(json!({
        "success": true,
        "order": {
            "id": order.id,
            "materialTitle": material.title,
        },
        "downloadUrl": state.public_url(&path),
        "message": "Payment verified successfully",
    })))
}
