//! Public catalog endpoints.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;
use crate::media::PLACEHOLDER_PNG;
use crate::models::material::parse_tags;
use crate::models::{Category, Material};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 12;
/// The admin catalog page asks for up to 1000 rows at once.
const MAX_PAGE_SIZE: i64 = 1000;
const FEATURED_LIMIT: i64 = 10;
const RELATED_LIMIT: i64 = 4;

/// Query string for the catalog listing. Values arrive as text and are
/// validated in [`MaterialFilter::from_query`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMaterialsQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub class_level: Option<String>,
    pub category: Option<String>,
    pub subject: Option<String>,
    pub is_featured: Option<String>,
    pub is_free: Option<String>,
    pub price_min: Option<String>,
    pub price_max: Option<String>,
    pub tags: Option<String>,
}

/// Validated catalog filters.
#[derive(Debug, Default, PartialEq)]
pub struct MaterialFilter {
    pub page: i64,
    pub limit: i64,
    /// ILIKE pattern matched against title, description and tags
    pub search: Option<String>,
    pub class_level: Option<String>,
    pub category: Option<Category>,
    /// ILIKE pattern
    pub subject: Option<String>,
    pub is_featured: Option<bool>,
    pub is_free: Option<bool>,
    pub price_min: Option<BigDecimal>,
    pub price_max: Option<BigDecimal>,
    pub tags: Option<Vec<String>>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Wraps user text in `%...%`, escaping LIKE metacharacters.
pub fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn parse_amount(name: &str, raw: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {}", name)))
}

impl MaterialFilter {
    pub fn from_query(query: &ListMaterialsQuery) -> Result<Self, AppError> {
        let page = present(&query.page)
            .and_then(|p| p.parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = present(&query.limit)
            .and_then(|l| l.parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);

        let category = present(&query.category)
            .map(Category::from_str)
            .transpose()
            .map_err(AppError::BadRequest)?;

        let price_min = present(&query.price_min)
            .map(|v| parse_amount("priceMin", v))
            .transpose()?;
        let price_max = present(&query.price_max)
            .map(|v| parse_amount("priceMax", v))
            .transpose()?;

        // An explicit price range replaces the free/paid switch.
        let is_free = if price_min.is_some() || price_max.is_some() {
            None
        } else {
            present(&query.is_free).map(|v| v == "true")
        };

        Ok(Self {
            page,
            limit,
            search: present(&query.search).map(contains_pattern),
            class_level: present(&query.class_level).map(str::to_string),
            category,
            subject: present(&query.subject).map(contains_pattern),
            is_featured: present(&query.is_featured).map(|v| v == "true"),
            is_free,
            price_min,
            price_max,
            tags: present(&query.tags)
                .map(parse_tags)
                .filter(|tags| !tags.is_empty()),
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Number of pages needed for `total` rows.
pub fn page_count(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

const FILTER_SQL: &str = r#"
    ($1::TEXT IS NULL
        OR title ILIKE $1
        OR description ILIKE $1
        OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE $1))
    AND ($2::TEXT IS NULL OR class_level = $2)
    AND ($3::material_category IS NULL OR category = $3)
    AND ($4::TEXT IS NULL OR subject ILIKE $4)
    AND ($5::BOOLEAN IS NULL OR is_featured = $5)
    AND ($6::BOOLEAN IS NULL OR (price_inr = 0) = $6)
    AND ($7::NUMERIC IS NULL OR price_inr >= $7)
    AND ($8::NUMERIC IS NULL OR price_inr <= $8)
    AND ($9::TEXT[] IS NULL OR tags && $9)
"#;

/// Creates the materials router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_materials))
        .route("/featured", get(featured_materials))
        .route("/{id}", get(get_material))
        .route("/{id}/preview", get(material_preview))
        .route("/{id}/related", get(related_materials))
        .with_state(state)
}

/// GET /api/materials
async fn list_materials(
    State(state): State<AppState>,
    Query(query): Query<ListMaterialsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let filter = MaterialFilter::from_query(&query)?;

    let (total,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM materials WHERE {}",
        FILTER_SQL
    ))
    .bind(&filter.search)
    .bind(&filter.class_level)
    .bind(filter.category)
    .bind(&filter.subject)
    .bind(filter.is_featured)
    .bind(filter.is_free)
    .bind(&filter.price_min)
    .bind(&filter.price_max)
    .bind(&filter.tags)
    .fetch_one(&state.pool)
    .await?;

    let materials: Vec<Material> = sqlx::query_as(&format!(
        "SELECT {} FROM materials WHERE {} ORDER BY created_at DESC LIMIT $10 OFFSET $11",
        Material::COLUMNS,
        FILTER_SQL
    ))
    .bind(&filter.search)
    .bind(&filter.class_level)
    .bind(filter.category)
    .bind(&filter.subject)
    .bind(filter.is_featured)
    .bind(filter.is_free)
    .bind(&filter.price_min)
    .bind(&filter.price_max)
    .bind(&filter.tags)
    .bind(filter.limit)
    .bind(filter.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({
        "success": true,
        "materials": materials,
        "pagination": {
            "page": filter.page,
            "limit": filter.limit,
            "total": total,
            "pages": page_count(total, filter.limit),
        }
    })))
}

/// GET /api/materials/featured
async fn featured_materials(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let materials: Vec<Material> = sqlx::query_as(&format!(
        "SELECT {} FROM materials WHERE is_featured ORDER BY created_at DESC LIMIT $1",
        Material::COLUMNS
    ))
    .bind(FEATURED_LIMIT)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({ "success": true, "materials": materials })))
}

/// Loads a material, failing with 404 when it does not exist.
pub(crate) async fn find_material(state: &AppState, id: Uuid) -> Result<Material, AppError> {
    sqlx::query_as(&format!(
        "SELECT {} FROM materials WHERE id = $1",
        Material::COLUMNS
    ))
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Material not found".to_string()))
}

/// Parses a path id; malformed ids are reported as missing materials.
pub(crate) fn material_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Material not found".to_string()))
}

/// GET /api/materials/{id}
async fn get_material(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let material = find_material(&state, material_id(&id)?).await?;
    if material.preview_image_id.is_none() {
        tracing::debug!(material_id = %material.id, "Material has no preview image");
    }
    Ok(Json(json!({ "success": true, "material": material })))
}

fn placeholder() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        PLACEHOLDER_PNG,
    )
        .into_response()
}

/// GET /api/materials/{id}/preview
///
/// Never fails: anything short of a stored preview yields the placeholder.
async fn material_preview(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return placeholder();
    };

    let preview_id = match find_material(&state, id).await {
        Ok(material) => material.preview_image_id,
        Err(AppError::NotFound(_)) => None,
        Err(e) => {
            tracing::error!(material_id = %id, "Error loading material for preview: {}", e);
            None
        }
    };
    let Some(preview_id) = preview_id else {
        return placeholder();
    };

    match state.blobs.open_download(preview_id).await {
        Ok(Some((file, chunks))) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, file.content_type),
                (
                    header::CACHE_CONTROL,
                    "public, max-age=31536000".to_string(),
                ),
            ],
            Body::from_stream(chunks),
        )
            .into_response(),
        Ok(None) => {
            tracing::warn!(material_id = %id, file_id = %preview_id, "Preview blob missing");
            placeholder()
        }
        Err(e) => {
            tracing::error!(material_id = %id, "Error opening preview: {}", e);
            placeholder()
        }
    }
}

/// GET /api/materials/{id}/related
async fn related_materials(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let material = find_material(&state, material_id(&id)?).await?;

    let materials: Vec<Material> = sqlx::query_as(&format!(
        r#"
        SELECT {} FROM materials
        WHERE id <> $1
          AND category = $2
          AND ($3::TEXT IS NULL OR class_level = $3)
        ORDER BY download_count DESC, created_at DESC
        LIMIT $4
        "#,
        Material::COLUMNS
    ))
    .bind(material.id)
    .bind(material.category)
    .bind(&material.class_level)
    .bind(RELATED_LIMIT)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({ "success": true, "materials": materials })))
}
