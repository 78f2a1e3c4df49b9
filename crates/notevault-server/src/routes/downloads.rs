//! File delivery for free materials and paid orders.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use notevault_crypto::DownloadToken;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Material, Order};
use crate::purchase::{paid_resource, ORDER_COLUMNS};
use crate::rate_limit::download_rate_limit;
use crate::routes::materials::{find_material, material_id};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaidDownloadQuery {
    pub expires: Option<i64>,
    pub sig: Option<String>,
}

/// Creates the download router. Every route is rate limited per client IP.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/free/{material_id}", get(free_download))
        .route("/paid/{order_id}", get(paid_download))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            download_rate_limit,
        ))
        .with_state(state)
}

/// `Content-Disposition` for an attachment, with an ASCII fallback name and
/// an RFC 5987 `filename*` for anything else.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    if fallback == filename {
        return format!("attachment; filename=\"{}\"", fallback);
    }

    let mut encoded = String::new();
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

/// Streams a material's primary file as an attachment.
async fn stream_material(state: &AppState, material: &Material) -> Result<Response, AppError> {
    let (file, chunks) = state
        .blobs
        .open_download(material.file_id)
        .await?
        .ok_or_else(|| {
            tracing::error!(material_id = %material.id, file_id = %material.file_id, "Material file missing from blob store");
            AppError::NotFound("File not found".to_string())
        })?;

    let filename = material
        .file_name_original
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .or(Some(file.original_name.as_str()).filter(|n| !n.trim().is_empty()))
        .unwrap_or("material");

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&content_disposition(filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"material\""));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(file.length)),
        ],
        Body::from_stream(chunks),
    )
        .into_response())
}

/// GET /api/download/free/{material_id}
async fn free_download(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let material = find_material(&state, material_id(&raw_id)?).await?;
    if !material.is_free() {
        return Err(AppError::Forbidden("This is a paid material".to_string()));
    }
    stream_material(&state, &material).await
}

/// GET /api/download/paid/{order_id}?expires=..&sig=..
async fn paid_download(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Query(query): Query<PaidDownloadQuery>,
) -> Result<Response, AppError> {
    let order_id = Uuid::parse_str(&raw_id)
        .map_err(|_| AppError::NotFound("Order not found".to_string()))?;

    let (Some(expires), Some(sig)) = (query.expires, query.sig) else {
        return Err(AppError::Forbidden("Invalid download link".to_string()));
    };
    let token = DownloadToken { expires, sig };
    if let Err(e) = token.verify(
        &state.config.download_link_secret,
        &paid_resource(order_id),
        Utc::now().timestamp(),
    ) {
        tracing::warn!(order_id = %order_id, "Rejected download link: {}", e);
        return Err(AppError::Forbidden(
            "Invalid or expired download link".to_string(),
        ));
    }

    let order: Order = sqlx::query_as(&format!(
        "SELECT {} FROM orders WHERE id = $1",
        ORDER_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if !order.is_captured() {
        return Err(AppError::Forbidden(
            "This order has been refunded or failed".to_string(),
        ));
    }

    let material_id = order
        .material_id
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;
    let material = find_material(&state, material_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::NotFound("File not found".to_string()),
            other => other,
        })?;

    stream_material(&state, &material).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("Physics Notes.pdf"),
            "attachment; filename=\"Physics Notes.pdf\""
        );
    }

    #[test]
    fn test_content_disposition_escapes_quotes_and_unicode() {
        let value = content_disposition("नोट्स \"v2\".pdf");
        assert!(value.starts_with("attachment; filename=\""));
        assert!(value.contains("filename*=UTF-8''"));
        assert!(value.contains("%22v2%22.pdf"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }
}
