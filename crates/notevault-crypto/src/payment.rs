// Payment gateway signatures
//
// The gateway signs two things with HMAC-SHA256:
// - checkout results: "{order_id}|{payment_id}" under the API key secret
// - webhook deliveries: the raw request body under the webhook secret

use anyhow::Result;

use crate::mac::{hmac_sha256_hex, verify_hmac_sha256_hex};

fn checkout_message(order_id: &str, payment_id: &str) -> String {
    format!("{}|{}", order_id, payment_id)
}

/// Computes the signature the gateway attaches to a completed checkout.
pub fn checkout_signature(key_secret: &str, order_id: &str, payment_id: &str) -> String {
    hmac_sha256_hex(
        key_secret.as_bytes(),
        checkout_message(order_id, payment_id).as_bytes(),
    )
}

/// Verifies a checkout signature returned to the browser by the gateway.
pub fn verify_checkout_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<()> {
    verify_hmac_sha256_hex(
        key_secret.as_bytes(),
        checkout_message(order_id, payment_id).as_bytes(),
        signature,
    )
}

/// Computes the webhook signature for a raw request body.
pub fn webhook_signature(webhook_secret: &str, body: &[u8]) -> String {
    hmac_sha256_hex(webhook_secret.as_bytes(), body)
}

/// Verifies the `X-Razorpay-Signature` header against the raw request body.
pub fn verify_webhook_signature(webhook_secret: &str, body: &[u8], signature: &str) -> Result<()> {
    verify_hmac_sha256_hex(webhook_secret.as_bytes(), body, signature)
}
