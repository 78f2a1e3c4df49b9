//! Material model: a purchasable or free downloadable document plus metadata.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::str::FromStr;
use uuid::Uuid;

/// Catalog taxonomy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "material_category")]
pub enum Category {
    #[default]
    Class,
    #[sqlx(rename = "JEE")]
    #[serde(rename = "JEE")]
    Jee,
    #[sqlx(rename = "NEET")]
    #[serde(rename = "NEET")]
    Neet,
    Foundation,
    Olympiad,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Class => "Class",
            Category::Jee => "JEE",
            Category::Neet => "NEET",
            Category::Foundation => "Foundation",
            Category::Olympiad => "Olympiad",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Class" => Ok(Category::Class),
            "JEE" => Ok(Category::Jee),
            "NEET" => Ok(Category::Neet),
            "Foundation" => Ok(Category::Foundation),
            "Olympiad" => Ok(Category::Olympiad),
            other => Err(format!(
                "Unsupported category: {}. Supported: Class, JEE, NEET, Foundation, Olympiad",
                other
            )),
        }
    }
}

/// A catalog entry.
///
/// The primary document blob id never leaves the server; downloads go
/// through the checkout and download routes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub subject: Option<String>,
    pub class_level: Option<String>,
    pub category: Category,
    #[serde(rename = "priceINR", with = "super::money")]
    pub price_inr: BigDecimal,
    pub tags: Vec<String>,
    #[serde(skip_serializing, default = "Uuid::nil")]
    pub file_id: Uuid,
    pub preview_image_id: Option<Uuid>,
    pub cover_image_id: Option<Uuid>,
    pub file_name_original: Option<String>,
    pub is_featured: bool,
    pub download_count: i64,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// Column list for `SELECT`s that decode into `Material`.
    pub const COLUMNS: &'static str = "id, title, description, subject, class_level, category, price_inr, tags, file_id, preview_image_id, cover_image_id, file_name_original, is_featured, download_count, uploaded_by, created_at, updated_at";

    /// A zero price marks the item free.
    pub fn is_free(&self) -> bool {
        self.price_inr.is_zero()
    }

    /// Every blob this material references, current and historical.
    pub fn blob_ids(&self, versions: &[MaterialVersion]) -> Vec<Uuid> {
        std::iter::once(self.file_id)
            .chain(self.preview_image_id)
            .chain(self.cover_image_id)
            .chain(versions.iter().map(|v| v.file_id))
            .collect()
    }
}

/// A previous primary file, kept when an admin uploads a replacement.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MaterialVersion {
    pub id: Uuid,
    pub material_id: Uuid,
    pub file_id: Uuid,
    pub version_note: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl MaterialVersion {
    pub const COLUMNS: &'static str = "id, material_id, file_id, version_note, uploaded_at";
}

/// Splits a comma-separated tag list, dropping blanks.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(price: &str) -> Material {
        let now = Utc::now();
        Material {
            id: Uuid::new_v4(),
            title: "Organic Chemistry Notes".to_string(),
            description: "Reaction mechanisms".to_string(),
            subject: Some("Chemistry".to_string()),
            class_level: Some("12".to_string()),
            category: Category::Jee,
            price_inr: BigDecimal::from_str(price).unwrap(),
            tags: vec!["chemistry".to_string()],
            file_id: Uuid::new_v4(),
            preview_image_id: Some(Uuid::new_v4()),
            cover_image_id: None,
            file_name_original: Some("organic.pdf".to_string()),
            is_featured: false,
            download_count: 3,
            uploaded_by: "admin".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_is_free() {
        assert!(sample("0").is_free());
        assert!(sample("0.00").is_free());
        assert!(!sample("99").is_free());
    }

    #[test]
    fn test_serialization_hides_file_id() {
        let material = sample("99.50");
        let json = serde_json::to_value(&material).unwrap();
        assert!(json.get("fileId").is_none());
        assert_eq!(json["_id"], material.id.to_string());
        assert_eq!(json["priceINR"], 99.5);
        assert_eq!(json["category"], "JEE");
        assert_eq!(json["classLevel"], "12");
    }

    #[test]
    fn test_blob_ids_include_versions() {
        let material = sample("0");
        let version = MaterialVersion {
            id: Uuid::new_v4(),
            material_id: material.id,
            file_id: Uuid::new_v4(),
            version_note: None,
            uploaded_at: Utc::now(),
        };
        let ids = material.blob_ids(std::slice::from_ref(&version));
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], material.file_id);
        assert!(ids.contains(&version.file_id));
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("NEET".parse::<Category>().unwrap(), Category::Neet);
        assert_eq!(" Class ".parse::<Category>().unwrap(), Category::Class);
        assert!("jee".parse::<Category>().is_err());
        assert_eq!(
            serde_json::from_str::<Category>("\"Olympiad\"").unwrap(),
            Category::Olympiad
        );
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("physics, mechanics,,  "), vec!["physics", "mechanics"]);
        assert!(parse_tags("").is_empty());
    }
}
