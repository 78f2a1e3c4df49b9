// HMAC-SHA256 signing and constant-time verification

use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn keyed(secret: &[u8]) -> HmacSha256 {
    match <HmacSha256 as Mac>::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    }
}

/// Computes HMAC-SHA256 of `message` under `secret` as lowercase hex.
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> String {
    let mut mac = keyed(secret);
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex-encoded HMAC-SHA256 signature.
///
/// The comparison runs in constant time. Upper-case hex is accepted;
/// anything that does not decode to exactly 32 bytes is rejected.
pub fn verify_hmac_sha256_hex(secret: &[u8], message: &[u8], signature_hex: &str) -> Result<()> {
    let expected = hex::decode(signature_hex.trim())
        .map_err(|e| anyhow!("Signature is not valid hex: {}", e))?;

    if expected.len() != 32 {
        return Err(anyhow!(
            "Invalid signature length: expected 32 bytes, got {}",
            expected.len()
        ));
    }

    let mut mac = keyed(secret);
    mac.update(message);
    mac.verify_slice(&expected)
        .map_err(|_| anyhow!("Signature mismatch"))
}
