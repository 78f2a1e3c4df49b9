//! Admin material management: multipart create/update, delete and listing.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    routing::{get, put},
    Json, Router,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::AppError;
use crate::media::{extract_first_page_image, is_allowed_image, resize_preview, validate_pdf};
use crate::models::material::parse_tags;
use crate::models::money::parse_price;
use crate::models::{BlobKind, Category, Material, MaterialVersion};
use crate::routes::materials::{find_material, material_id, page_count};
use crate::state::AppState;

const MAX_PAGE_SIZE: i64 = 1000;
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Material routes, merged into the admin router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/materials", get(list_materials).post(create_material))
        .route("/materials/{id}", put(update_material).delete(delete_material))
}

/// A file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    fn is_pdf(&self) -> bool {
        self.content_type == "application/pdf"
            || self.file_name.to_ascii_lowercase().ends_with(".pdf")
    }
}

/// Fields of the material create/update form.
#[derive(Debug, Default)]
pub struct MaterialForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub class_level: Option<String>,
    pub category: Option<String>,
    /// Raw price text; present-but-empty means free.
    pub price_inr: Option<String>,
    pub tags: Option<String>,
    pub is_featured: Option<String>,
    pub file_name_original: Option<String>,
    pub version_note: Option<String>,
    pub file: Option<UploadedFile>,
    pub preview_image: Option<UploadedFile>,
    pub cover_image: Option<UploadedFile>,
}

fn text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl MaterialForm {
    /// Slot for a text field, `None` for names the form does not know.
    fn text_field(&mut self, name: &str) -> Option<&mut Option<String>> {
        let slot = match name {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "subject" => &mut self.subject,
            "classLevel" => &mut self.class_level,
            "category" => &mut self.category,
            "priceINR" => &mut self.price_inr,
            "tags" => &mut self.tags,
            "isFeatured" => &mut self.is_featured,
            "fileNameOriginal" => &mut self.file_name_original,
            "versionNote" => &mut self.version_note,
            _ => return None,
        };
        Some(slot)
    }

    /// Reads a multipart form, or a JSON object of text fields when the
    /// request is `application/json` (no files).
    pub async fn extract<S: Send + Sync>(request: Request, state: &S) -> Result<Self, AppError> {
        let is_json = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().starts_with("application/json"));

        if is_json {
            let body = Bytes::from_request(request, state)
                .await
                .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?;
            return Self::from_json(&body);
        }

        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;
        Self::read(multipart).await
    }

    /// Text fields from a JSON object. Booleans and numbers are taken as
    /// their text form, arrays as a comma list.
    pub fn from_json(body: &[u8]) -> Result<Self, AppError> {
        let fields: serde_json::Map<String, Value> = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid material update: {}", e)))?;

        let mut form = Self::default();
        for (name, value) in fields {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                Value::Object(_) => {
                    return Err(AppError::BadRequest(format!("Invalid value for {}", name)))
                }
            };
            if let Some(slot) = form.text_field(&name) {
                *slot = Some(text);
            }
        }
        Ok(form)
    }

    /// Reads every part of the request. Unknown fields are ignored.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if matches!(name.as_str(), "file" | "previewImage" | "coverImage") {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?;
                if bytes.is_empty() {
                    continue;
                }
                let upload = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
                match name.as_str() {
                    "file" => form.file = upload,
                    "previewImage" => form.preview_image = upload,
                    _ => form.cover_image = upload,
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?;
            if let Some(slot) = form.text_field(&name) {
                *slot = Some(value);
            }
        }

        Ok(form)
    }

    /// Checks the image parts' content types and the document's PDF header.
    pub fn validate_files(&self) -> Result<(), AppError> {
        for (label, image) in [
            ("Preview image", &self.preview_image),
            ("Cover image", &self.cover_image),
        ] {
            if let Some(image) = image {
                if !is_allowed_image(&image.content_type) {
                    return Err(AppError::BadRequest(format!(
                        "{} must be a JPEG, PNG or WebP image",
                        label
                    )));
                }
            }
        }
        if let Some(file) = &self.file {
            if file.is_pdf() {
                validate_pdf(&file.bytes)?;
            }
        }
        Ok(())
    }

    pub fn category(&self) -> Result<Option<Category>, AppError> {
        text(&self.category)
            .map(|c| Category::from_str(&c))
            .transpose()
            .map_err(AppError::BadRequest)
    }

    pub fn price(&self) -> Result<Option<BigDecimal>, AppError> {
        self.price_inr
            .as_deref()
            .map(parse_price)
            .transpose()
            .map_err(AppError::BadRequest)
    }

    pub fn featured(&self) -> Option<bool> {
        self.is_featured.as_deref().map(|v| v.trim() == "true")
    }

    pub fn tag_list(&self) -> Option<Vec<String>> {
        text(&self.tags).map(|t| parse_tags(&t))
    }
}

/// Stores a preview from an uploaded image, letterboxed when decodable.
async fn store_uploaded_preview(state: &AppState, image: &UploadedFile) -> Result<Uuid, AppError> {
    let source = image.bytes.clone();
    let resized = tokio::task::spawn_blocking(move || resize_preview(&source))
        .await
        .map_err(|e| AppError::Internal(format!("Preview task failed: {}", e)))?;

    let content_type = if resized.starts_with(PNG_MAGIC) {
        "image/png"
    } else {
        image.content_type.as_str()
    };
    state
        .blobs
        .upload(&resized, &image.file_name, content_type, BlobKind::Preview)
        .await
}

/// Stores a preview pulled out of a PDF. `None` when nothing was extracted.
async fn store_extracted_preview(
    state: &AppState,
    pdf: &UploadedFile,
) -> Result<Option<Uuid>, AppError> {
    let source = pdf.bytes.clone();
    let extracted = tokio::task::spawn_blocking(move || extract_first_page_image(&source))
        .await
        .map_err(|e| AppError::Internal(format!("Preview task failed: {}", e)))?;

    let Some(png) = extracted else {
        tracing::debug!(file = %pdf.file_name, "No preview image found in PDF");
        return Ok(None);
    };
    let id = state
        .blobs
        .upload(&png, "preview.png", "image/png", BlobKind::Preview)
        .await?;
    Ok(Some(id))
}

async fn store_file(state: &AppState, file: &UploadedFile, kind: BlobKind) -> Result<Uuid, AppError> {
    state
        .blobs
        .upload(&file.bytes, &file.file_name, &file.content_type, kind)
        .await
}

/// Removes blobs written for a request that then failed.
async fn discard(state: &AppState, ids: &[Uuid]) {
    for id in ids {
        state.blobs.delete_best_effort(*id).await;
    }
}

/// POST /api/admin/materials
async fn create_material(
    State(state): State<AppState>,
    admin: AdminUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let form = MaterialForm::read(multipart).await?;

    let (Some(title), Some(description)) = (text(&form.title), text(&form.description)) else {
        return Err(AppError::BadRequest(
            "Title and description required".to_string(),
        ));
    };
    let Some(file) = &form.file else {
        return Err(AppError::BadRequest("File is required".to_string()));
    };
    form.validate_files()?;
    let category = form.category()?.unwrap_or_default();
    let price = form.price()?.unwrap_or_default();

    let file_id = store_file(&state, file, BlobKind::Document).await?;
    let mut written = vec![file_id];

    let preview_image_id = match (&form.preview_image, file.is_pdf()) {
        (Some(image), _) => match store_uploaded_preview(&state, image).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!("Error processing preview image: {}", e);
                None
            }
        },
        (None, true) => store_extracted_preview(&state, file)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Error extracting PDF preview: {}", e);
                None
            }),
        (None, false) => None,
    };
    written.extend(preview_image_id);

    let cover_image_id = match &form.cover_image {
        Some(cover) => match store_file(&state, cover, BlobKind::Cover).await {
            Ok(id) => Some(id),
            Err(e) => {
                discard(&state, &written).await;
                return Err(e);
            }
        },
        None => None,
    };
    written.extend(cover_image_id);

    let inserted: Result<Material, sqlx::Error> = sqlx::query_as(&format!(
        r#"
        INSERT INTO materials (id, title, description, subject, class_level, category, price_inr, tags,
                               file_id, preview_image_id, cover_image_id, file_name_original,
                               is_featured, download_count, uploaded_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 0, $14, NOW(), NOW())
        RETURNING {}
        "#,
        Material::COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(&title)
    .bind(&description)
    .bind(text(&form.subject))
    .bind(text(&form.class_level))
    .bind(category)
    .bind(&price)
    .bind(form.tag_list().unwrap_or_default())
    .bind(file_id)
    .bind(preview_image_id)
    .bind(cover_image_id)
    .bind(text(&form.file_name_original).unwrap_or_else(|| file.file_name.clone()))
    .bind(form.featured().unwrap_or(false))
    .bind(&admin.username)
    .fetch_one(&state.pool)
    .await;

    let material = match inserted {
        Ok(material) => material,
        Err(e) => {
            discard(&state, &written).await;
            return Err(e.into());
        }
    };

    tracing::info!(material_id = %material.id, admin_id = %admin.id, "Material created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "material": material })),
    ))
}

/// PUT /api/admin/materials/{id}
async fn update_material(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(raw_id): Path<String>,
    request: Request,
) -> Result<Json<Value>, AppError> {
    let mut material = find_material(&state, material_id(&raw_id)?).await?;
    let form = MaterialForm::extract(request, &state).await?;
    form.validate_files()?;

    if let Some(title) = text(&form.title) {
        material.title = title;
    }
    if let Some(description) = text(&form.description) {
        material.description = description;
    }
    if let Some(subject) = text(&form.subject) {
        material.subject = Some(subject);
    }
    if let Some(class_level) = text(&form.class_level) {
        material.class_level = Some(class_level);
    }
    if let Some(category) = form.category()? {
        material.category = category;
    }
    if let Some(price) = form.price()? {
        material.price_inr = price;
    }
    if let Some(tags) = form.tag_list() {
        material.tags = tags;
    }
    if let Some(featured) = form.featured() {
        material.is_featured = featured;
    }

    // Blobs replaced by this update, deleted once the row is committed.
    let mut superseded = Vec::new();
    let mut written = Vec::new();
    let mut retired_file = None;

    if let Some(file) = &form.file {
        let new_file_id = store_file(&state, file, BlobKind::Document).await?;
        written.push(new_file_id);
        retired_file = Some(material.file_id);
        material.file_id = new_file_id;
        material.file_name_original =
            Some(text(&form.file_name_original).unwrap_or_else(|| file.file_name.clone()));

        if form.preview_image.is_none() && file.is_pdf() {
            match store_extracted_preview(&state, file).await {
                Ok(Some(preview_id)) => {
                    written.push(preview_id);
                    superseded.extend(material.preview_image_id.replace(preview_id));
                }
                Ok(None) => {}
                Err(e) => tracing::error!("Error extracting PDF preview: {}", e),
            }
        }
    } else if let Some(name) = text(&form.file_name_original) {
        material.file_name_original = Some(name);
    }

    if let Some(image) = &form.preview_image {
        let preview_id = match store_uploaded_preview(&state, image).await {
            Ok(id) => id,
            Err(e) => {
                discard(&state, &written).await;
                return Err(e);
            }
        };
        written.push(preview_id);
        superseded.extend(material.preview_image_id.replace(preview_id));
    }

    if let Some(cover) = &form.cover_image {
        let cover_id = match store_file(&state, cover, BlobKind::Cover).await {
            Ok(id) => id,
            Err(e) => {
                discard(&state, &written).await;
                return Err(e);
            }
        };
        written.push(cover_id);
        superseded.extend(material.cover_image_id.replace(cover_id));
    }

    let saved = save_material(&state, &material, retired_file, form.version_note.as_deref()).await;
    let material = match saved {
        Ok(material) => material,
        Err(e) => {
            discard(&state, &written).await;
            return Err(e);
        }
    };

    discard(&state, &superseded).await;

    tracing::info!(material_id = %material.id, admin_id = %admin.id, "Material updated");

    Ok(Json(json!({ "success": true, "material": material })))
}

/// Writes the edited row and, when the primary file changed, the version entry.
async fn save_material(
    state: &AppState,
    material: &Material,
    retired_file: Option<Uuid>,
    version_note: Option<&str>,
) -> Result<Material, AppError> {
    let mut tx = state.pool.begin().await?;

    if let Some(old_file_id) = retired_file {
        let note = version_note
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Previous version");
        sqlx::query(
            r#"
            INSERT INTO material_versions (id, material_id, file_id, version_note, uploaded_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(material.id)
        .bind(old_file_id)
        .bind(note)
        .execute(&mut *tx)
        .await?;
    }

    let saved: Material = sqlx::query_as(&format!(
        r#"
        UPDATE materials
        SET title = $2, description = $3, subject = $4, class_level = $5, category = $6,
            price_inr = $7, tags = $8, file_id = $9, preview_image_id = $10,
            cover_image_id = $11, file_name_original = $12, is_featured = $13,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        Material::COLUMNS
    ))
    .bind(material.id)
    .bind(&material.title)
    .bind(&material.description)
    .bind(&material.subject)
    .bind(&material.class_level)
    .bind(material.category)
    .bind(&material.price_inr)
    .bind(&material.tags)
    .bind(material.file_id)
    .bind(material.preview_image_id)
    .bind(material.cover_image_id)
    .bind(&material.file_name_original)
    .bind(material.is_featured)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Material not found".to_string()))?;

    tx.commit().await?;
    Ok(saved)
}

/// DELETE /api/admin/materials/{id}
async fn delete_material(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let material = find_material(&state, material_id(&raw_id)?).await?;

    let versions: Vec<MaterialVersion> = sqlx::query_as(&format!(
        "SELECT {} FROM material_versions WHERE material_id = $1",
        MaterialVersion::COLUMNS
    ))
    .bind(material.id)
    .fetch_all(&state.pool)
    .await?;

    discard(&state, &material.blob_ids(&versions)).await;

    sqlx::query("DELETE FROM materials WHERE id = $1")
        .bind(material.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(material_id = %material.id, admin_id = %admin.id, "Material deleted");

    Ok(Json(json!({ "success": true, "message": "Material deleted successfully" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl AdminListQuery {
    /// `(page, limit)`. Without a limit the whole catalog is one page.
    pub fn window(&self) -> (i64, Option<i64>) {
        let limit = self
            .limit
            .filter(|l| *l >= 1)
            .map(|l| l.min(MAX_PAGE_SIZE));
        let page = match limit {
            Some(_) => self.page.filter(|p| *p >= 1).unwrap_or(1),
            None => 1,
        };
        (page, limit)
    }
}

/// A material as shown in the admin catalog.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AdminMaterial {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub material: Material,
    pub versions_count: i64,
}

/// GET /api/admin/materials
async fn list_materials(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<Value>, AppError> {
    let (page, limit) = query.window();

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM materials")
        .fetch_one(&state.pool)
        .await?;

    let materials: Vec<AdminMaterial> = sqlx::query_as(&format!(
        r#"
        SELECT {},
               (SELECT COUNT(*) FROM material_versions WHERE material_versions.material_id = materials.id) AS versions_count
        FROM materials
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#,
        Material::COLUMNS
    ))
    .bind(limit)
    .bind(limit.map_or(0, |l| (page - 1) * l))
    .fetch_all(&state.pool)
    .await?;

    let limit = limit.unwrap_or(total.max(1));

    Ok(Json(json!({
        "success": true,
        "materials": materials,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": page_count(total, limit),
        }
    })))
}
