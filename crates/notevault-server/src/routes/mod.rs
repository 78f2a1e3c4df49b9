//! API routes for the NoteVault server.

pub mod admin;
pub mod admin_materials;
pub mod checkout;
pub mod contact;
pub mod downloads;
pub mod materials;
pub mod webhooks;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::routes::webhooks::SIGNATURE_HEADER;
use crate::state::AppState;

/// Creates the main API router with all routes mounted.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    let cors = cors_layer(&state);

    Router::new()
        .nest("/api", api_routes(state))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/materials", materials::router(state.clone()))
        .nest("/checkout", checkout::router(state.clone()))
        .nest("/download", downloads::router(state.clone()))
        .nest("/admin", admin::router(state.clone()))
        .nest("/webhooks", webhooks::router(state.clone()))
        .merge(contact::router(state))
}

/// Credentialed CORS. Development mirrors the caller's origin.
fn cors_layer(state: &AppState) -> CorsLayer {
    let origin = if state.config.is_production() {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins()
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    } else {
        AllowOrigin::mirror_request()
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(SIGNATURE_HEADER),
        ])
}

/// GET /api/health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
