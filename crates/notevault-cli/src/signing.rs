// Signing module - gateway signatures over local files, for exercising webhooks by hand

use anyhow::{Context, Result};
use std::path::Path;

/// Reads a payload file exactly as it will be sent, without trimming.
pub fn read_payload(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

/// Signature the gateway would put in `X-Razorpay-Signature` for this file.
pub fn sign_webhook_file(path: &Path, secret: &str) -> Result<String> {
    let body = read_payload(path)?;
    Ok(notevault_crypto::webhook_signature(secret, &body))
}

/// Checks a webhook signature against a payload file.
pub fn verify_webhook_file(path: &Path, signature: &str, secret: &str) -> Result<()> {
    let body = read_payload(path)?;
    notevault_crypto::verify_webhook_signature(secret, &body, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn payload_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn test_sign_then_verify_file() {
        let file = payload_file(br#"{"event":"payment.captured"}"#);
        let signature = sign_webhook_file(file.path(), "whsec").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(verify_webhook_file(file.path(), &signature, "whsec").is_ok());
        assert!(verify_webhook_file(file.path(), &signature, "other").is_err());
    }

    #[test]
    fn test_trailing_newline_changes_signature() {
        let bare = payload_file(b"{}");
        let newline = payload_file(b"{}\n");
        assert_ne!(
            sign_webhook_file(bare.path(), "whsec").unwrap(),
            sign_webhook_file(newline.path(), "whsec").unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = sign_webhook_file(Path::new("/nonexistent/payload.json"), "s").unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
