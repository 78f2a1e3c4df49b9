// Signed, expiring download links
//
// A token authorises fetching one resource (e.g. "paid:<order id>") until
// a unix timestamp. The signature is HMAC-SHA256 over "{resource}:{expires}".

use anyhow::{anyhow, Result};

use crate::mac::{hmac_sha256_hex, verify_hmac_sha256_hex};

/// A download token as carried in the `expires` and `sig` query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadToken {
    /// Unix timestamp (seconds) after which the token is rejected.
    pub expires: i64,
    /// Hex-encoded HMAC signature.
    pub sig: String,
}

impl DownloadToken {
    fn message(resource: &str, expires: i64) -> String {
        format!("{}:{}", resource, expires)
    }

    /// Signs `resource` so that it can be fetched until `expires`.
    pub fn sign(secret: &str, resource: &str, expires: i64) -> Self {
        Self {
            expires,
            sig: hmac_sha256_hex(secret.as_bytes(), Self::message(resource, expires).as_bytes()),
        }
    }

    /// Checks the token for `resource` at time `now` (unix seconds).
    pub fn verify(&self, secret: &str, resource: &str, now: i64) -> Result<()> {
        if now > self.expires {
            return Err(anyhow!("Download link expired"));
        }
        verify_hmac_sha256_hex(
            secret.as_bytes(),
            Self::message(resource, self.expires).as_bytes(),
            &self.sig,
        )
    }

    /// Renders the token as a query string (without the leading `?`).
    pub fn to_query(&self) -> String {
        format!("expires={}&sig={}", self.expires, self.sig)
    }
}
