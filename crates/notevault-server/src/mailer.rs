//! Outbound mail through an HTTP relay (MailerSend-compatible API).

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::config::MailConfig;
use crate::error::AppError;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Address {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }
}

/// A message as accepted by the relay.
#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub from: Address,
    pub to: Vec<Address>,
    pub reply_to: Option<Address>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Mailer {
    client: Client,
    config: MailConfig,
}

impl Mailer {
    pub fn new(config: MailConfig, client: Client) -> Self {
        Self { client, config }
    }

    /// Sender address for outgoing mail.
    pub fn from_address(&self) -> Address {
        Address::new(self.config.from.clone())
    }

    pub async fn send(&self, email: &Email) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_token)
            .timeout(SEND_TIMEOUT)
            .json(email)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Email send failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Mail relay returned {}: {}",
                status, body
            )));
        }

        tracing::debug!(to = ?email.to.iter().map(|a| &a.email).collect::<Vec<_>>(), "Email sent");
        Ok(())
    }
}

/// Escapes text for inclusion in an HTML body.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}
