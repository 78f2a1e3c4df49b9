//! Chunked blob store backed by Postgres.
//!
//! Files are split into fixed-size chunks (`blob_chunks`) with one
//! metadata row each (`blob_files`). Downloads stream one chunk per query,
//! so a large document is never buffered whole.

use axum::body::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{BlobFile, BlobKind};

/// Chunk size for stored files (255 KiB).
pub const CHUNK_SIZE: usize = 255 * 1024;

/// Stream of file bytes, in chunk order.
pub type ChunkStream = BoxStream<'static, Result<Bytes, sqlx::Error>>;

const FILE_COLUMNS: &str = "id, filename, original_name, content_type, kind, length, chunk_size, sha256, uploaded_at";

/// Stored name for an upload: unique prefix plus the client's base name.
pub fn stored_filename(id: Uuid, original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("file");
    format!("{}-{}", id, base)
}

#[derive(Clone)]
pub struct BlobStore {
    pool: PgPool,
}

impl BlobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a file and returns its id. Metadata and chunks are written in
    /// one transaction.
    pub async fn upload(
        &self,
        bytes: &[u8],
        original_name: &str,
        content_type: &str,
        kind: BlobKind,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO blob_files (id, filename, original_name, content_type, kind, length, chunk_size, sha256, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            "#,
        )
        .bind(id)
        .bind(stored_filename(id, original_name))
        .bind(original_name)
        .bind(content_type)
        .bind(kind)
        .bind(bytes.len() as i64)
        .bind(CHUNK_SIZE as i32)
        .bind(notevault_crypto::sha256_hex(bytes))
        .execute(&mut *tx)
        .await?;

        for (n, chunk) in bytes.chunks(CHUNK_SIZE).enumerate() {
            sqlx::query("INSERT INTO blob_chunks (file_id, n, data) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(n as i32)
                .bind(chunk)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(file_id = %id, length = bytes.len(), kind = ?kind, "Stored blob");
        Ok(id)
    }

    pub async fn metadata(&self, id: Uuid) -> Result<Option<BlobFile>, AppError> {
        let file = sqlx::query_as(&format!(
            "SELECT {} FROM blob_files WHERE id = $1",
            FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(file)
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool, AppError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM blob_files WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Opens a file for streaming. `None` when the id is unknown.
    pub async fn open_download(&self, id: Uuid) -> Result<Option<(BlobFile, ChunkStream)>, AppError> {
        let Some(file) = self.metadata(id).await? else {
            return Ok(None);
        };

        let pool = self.pool.clone();
        let chunks = file.chunk_count();
        let body = stream::try_unfold(0i32, move |n| {
            let pool = pool.clone();
            async move {
                if n >= chunks {
                    return Ok(None);
                }
                let (data,): (Vec<u8>,) =
                    sqlx::query_as("SELECT data FROM blob_chunks WHERE file_id = $1 AND n = $2")
                        .bind(id)
                        .bind(n)
                        .fetch_one(&pool)
                        .await?;
                Ok(Some((Bytes::from(data), n + 1)))
            }
        })
        .boxed();

        Ok(Some((file, body)))
    }

    /// Reads a whole file into memory. Used for small images only.
    pub async fn read_all(&self, id: Uuid) -> Result<Option<Vec<u8>>, AppError> {
        if !self.exists(id).await? {
            return Ok(None);
        }

        let chunks: Vec<(Vec<u8>,)> =
            sqlx::query_as("SELECT data FROM blob_chunks WHERE file_id = $1 ORDER BY n")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        Ok(Some(chunks.into_iter().flat_map(|(data,)| data).collect()))
    }

    /// Removes a file. A missing id is not an error.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM blob_chunks WHERE file_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM blob_files WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if removed == 0 {
            tracing::warn!(file_id = %id, "Blob not found for deletion");
        }
        Ok(())
    }

    /// Cleanup variant of [`delete`](Self::delete): failures are logged and dropped.
    pub async fn delete_best_effort(&self, id: Uuid) {
        if let Err(e) = self.delete(id).await {
            tracing::warn!(file_id = %id, "Failed to delete blob: {}", e);
        }
    }
}
