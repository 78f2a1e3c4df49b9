//! Contact form relay.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::mailer::{escape_html, Address, Email};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// A validated submission.
#[derive(Debug, PartialEq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

fn field(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ContactMessage {
    pub fn from_request(req: &ContactRequest) -> Result<Self, AppError> {
        let (Some(name), Some(email), Some(message)) =
            (field(&req.name), field(&req.email), field(&req.message))
        else {
            return Err(AppError::BadRequest(
                "Name, email, and message are required".to_string(),
            ));
        };

        if !is_valid_email(&email) {
            return Err(AppError::BadRequest("Invalid email address".to_string()));
        }

        Ok(Self {
            name,
            email,
            subject: field(&req.subject),
            message,
        })
    }

    pub fn mail_subject(&self) -> String {
        self.subject
            .clone()
            .unwrap_or_else(|| format!("Contact Form: {}", self.name))
    }

    pub fn html_body(&self) -> String {
        let subject = self
            .subject
            .as_deref()
            .map(|s| format!("<p><strong>Subject:</strong> {}</p>\n", escape_html(s)))
            .unwrap_or_default();
        format!(
            "<h2>New Contact Form Submission</h2>\n\
             <p><strong>Name:</strong> {name}</p>\n\
             <p><strong>Email:</strong> {email}</p>\n\
             {subject}\
             <p><strong>Message:</strong></p>\n\
             <p>{message}</p>\n\
             <hr>\n\
             <p><small>This email was sent from the contact form on your website.</small></p>\n\
             <p><small>Reply to: {email}</small></p>\n",
            name = escape_html(&self.name),
            email = escape_html(&self.email),
            subject = subject,
            message = escape_html(&self.message).replace('\n', "<br>"),
        )
    }

    pub fn text_body(&self) -> String {
        let subject = self
            .subject
            .as_deref()
            .map(|s| format!("Subject: {}\n", s))
            .unwrap_or_default();
        format!(
            "New Contact Form Submission\n\nName: {}\nEmail: {}\n{}\nMessage:\n{}\n\n---\nReply to: {}\n",
            self.name, self.email, subject, self.message, self.email
        )
    }

    fn log(&self, reason: &str) {
        tracing::info!(
            name = %self.name,
            email = %self.email,
            subject = self.subject.as_deref().unwrap_or("No subject"),
            message = %self.message,
            "Contact form submission ({})",
            reason
        );
    }
}

/// Creates the contact router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/contact", post(submit_contact))
        .with_state(state)
}

/// POST /api/contact
async fn submit_contact(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let contact = ContactMessage::from_request(&req)?;
    let production = state.config.is_production();

    let Some(mailer) = &state.mailer else {
        if production {
            return Err(AppError::Upstream(
                "Email service is not configured. Please contact the administrator.".to_string(),
            ));
        }
        contact.log("mail relay not configured");
        return Ok(Json(json!({
            "success": true,
            "message": "Your message has been received! (Development mode - email not configured. Check server logs.)",
        })));
    };

    let email = Email {
        from: mailer.from_address(),
        to: vec![Address::new(state.config.contact_inbox.clone())],
        reply_to: Some(Address::new(contact.email.clone())),
        subject: contact.mail_subject(),
        html: contact.html_body(),
        text: contact.text_body(),
    };

    if let Err(e) = mailer.send(&email).await {
        tracing::error!("Error sending contact email: {}", e);
        contact.log("email failed");
        if production {
            return Err(AppError::Upstream(
                "Error sending message. Please try again later.".to_string(),
            ));
        }
        return Ok(Json(json!({
            "success": true,
            "message": "Your message has been received! (Email sending failed in development. Check server logs.)",
        })));
    }

    tracing::info!(email = %contact.email, "Contact form email sent");
    Ok(Json(json!({
        "success": true,
        "message": "Your message has been sent successfully! We'll get back to you soon.",
    })))
}
