//! Error types for the NoteVault server.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// A dependency (mail relay, captcha service) failed; the message is shown to the client.
    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Rate limit exceeded: {message}")]
    TooManyRequests {
        message: String,
        /// Seconds until the window resets.
        retry_after: u64,
    },
}

impl AppError {
    /// Maps a unique-constraint violation to `on_duplicate`, passing other errors through.
    pub fn from_insert(err: sqlx::Error, on_duplicate: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::BadRequest(on_duplicate.to_string())
            }
            _ => AppError::Database(err),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_)
            | AppError::Internal(_)
            | AppError::PaymentGateway(_)
            | AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

fn body(message: &str) -> Json<serde_json::Value> {
    Json(json!({ "success": false, "message": message }))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (status, body("Internal server error")).into_response()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (status, body("Internal server error")).into_response()
            }
            AppError::PaymentGateway(msg) => {
                tracing::error!("Payment gateway error: {}", msg);
                (status, body(&msg)).into_response()
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream service error: {}", msg);
                (status, body(&msg)).into_response()
            }
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg) => (status, body(&msg)).into_response(),
            AppError::TooManyRequests {
                message,
                retry_after,
            } => {
                let mut response = (status, body(&message)).into_response();
                response.headers_mut().insert(
                    axum::http::header::RETRY_AFTER,
                    HeaderValue::from_str(&retry_after.to_string())
                        .unwrap_or_else(|_| HeaderValue::from_static("900")),
                );
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn json_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_renders_json() {
        let response = AppError::NotFound("Material not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_of(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Material not found");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = AppError::Internal("secret connection string".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_of(response).await;
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_too_many_requests_sets_retry_after() {
        let response = AppError::TooManyRequests {
            message: "Too many checkout attempts, please try again later".to_string(),
            retry_after: 120,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(axum::http::header::RETRY_AFTER).unwrap(),
            "120"
        );
    }

    #[test]
    fn test_from_insert_passes_through_other_errors() {
        let err = AppError::from_insert(sqlx::Error::RowNotFound, "Payment already processed");
        assert!(matches!(err, AppError::Database(sqlx::Error::RowNotFound)));
    }
}
