//! reCAPTCHA verification for public checkout forms.
//!
//! Verification degrades open: a missing secret, a missing token or a
//! misconfigured site key lets the request through with a warning. Only a
//! low v3 score in production rejects a request.

use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Scores below this are treated as bots.
const MIN_SCORE: f64 = 0.5;

/// Error codes that indicate our own configuration is wrong rather than the visitor.
const CONFIG_ERROR_CODES: &[&str] = &[
    "invalid-input-secret",
    "invalid-input-response",
    "bad-request",
    "timeout-or-duplicate",
];

#[derive(Debug, Deserialize)]
pub struct SiteVerifyResponse {
    pub success: bool,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, rename = "error-codes")]
    pub error_codes: Vec<String>,
}

/// Decides what to do with a siteverify answer.
pub fn assess(response: &SiteVerifyResponse, production: bool) -> Result<(), AppError> {
    if !response.success {
        let config_error = response
            .error_codes
            .iter()
            .any(|code| CONFIG_ERROR_CODES.contains(&code.as_str()));
        if config_error {
            tracing::warn!(codes = ?response.error_codes, "reCAPTCHA configuration error, allowing request");
        } else {
            tracing::warn!(codes = ?response.error_codes, "reCAPTCHA verification failed, allowing request");
        }
        return Ok(());
    }

    match response.score {
        Some(score) if score < MIN_SCORE => {
            tracing::warn!(score, "reCAPTCHA score too low");
            if production {
                Err(AppError::BadRequest(
                    "reCAPTCHA verification failed. Please try again.".to_string(),
                ))
            } else {
                tracing::warn!("Low reCAPTCHA score allowed in development");
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

/// Verifies a visitor token against the configured secret.
pub async fn verify_recaptcha(state: &AppState, token: Option<&str>) -> Result<(), AppError> {
    let Some(secret) = state.config.recaptcha_secret.as_deref() else {
        tracing::debug!("RECAPTCHA_SECRET_KEY not set, skipping verification");
        return Ok(());
    };

    let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
        tracing::warn!("reCAPTCHA token missing, allowing request");
        return Ok(());
    };

    let production = state.config.is_production();
    let outcome = async {
        state
            .http
            .post(SITEVERIFY_URL)
            .form(&[("secret", secret), ("response", token)])
            .send()
            .await?
            .json::<SiteVerifyResponse>()
            .await
    }
    .await;

    match outcome {
        Ok(response) => assess(&response, production),
        Err(e) if production => Err(AppError::Upstream(format!(
            "Error verifying reCAPTCHA. Please try again. ({})",
            e
        ))),
        Err(e) => {
            tracing::warn!("reCAPTCHA request failed, allowing in development: {}", e);
            Ok(())
        }
    }
}
