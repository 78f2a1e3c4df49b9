//! Download log entries, kept for analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// `None` once the material has been deleted; the entry stays for analytics.
    pub material_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub is_free: bool,
    pub downloaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDownload {
    pub material_id: Uuid,
    pub order_id: Option<Uuid>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub is_free: bool,
}

impl NewDownload {
    pub fn free(material_id: Uuid, email: &str, mobile: Option<String>) -> Self {
        Self {
            material_id,
            order_id: None,
            email: Some(email.trim().to_lowercase()),
            mobile,
            is_free: true,
        }
    }

    pub fn paid(
        material_id: Uuid,
        order_id: Uuid,
        email: &str,
        mobile: Option<String>,
    ) -> Self {
        Self {
            material_id,
            order_id: Some(order_id),
            email: Some(email.trim().to_lowercase()),
            mobile,
            is_free: false,
        }
    }
}
