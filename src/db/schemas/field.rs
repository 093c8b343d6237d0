//! Rice field document schema

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::submission::GeoPoint;

/// Collection name for fields
pub const FIELDS_COLLECTION: &str = "fields";

/// A registered rice field
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FieldDoc {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub coordinates: GeoPoint,

    /// Area in hectares
    #[serde(default)]
    pub area: f64,

    #[serde(default)]
    pub rice_variety: String,

    #[serde(default)]
    pub tentative_date: String,

    pub owner_id: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl IntoIndexes for FieldDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "owner_id": 1 },
                Some(IndexOptions::builder().name("owner_id_index".to_string()).build()),
            ),
        ]
    }
}
