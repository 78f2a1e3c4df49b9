//! Blob store metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// What a stored file is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "blob_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BlobKind {
    Document,
    Preview,
    Cover,
}

/// Metadata row for a stored file. The bytes live in `blob_chunks`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BlobFile {
    pub id: Uuid,
    /// Unique stored name: "{uuid}-{original name}".
    pub filename: String,
    pub original_name: String,
    pub content_type: String,
    pub kind: BlobKind,
    pub length: i64,
    pub chunk_size: i32,
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

impl BlobFile {
    /// Number of chunk rows backing this file.
    pub fn chunk_count(&self) -> i32 {
        if self.length == 0 {
            return 0;
        }
        let size = i64::from(self.chunk_size.max(1));
        ((self.length + size - 1) / size) as i32
    }
}
