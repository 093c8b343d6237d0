//! Sheet registration schema
//!
//! Each document designates one spreadsheet the sync engine mirrors
//! submissions into. Registrations are created out-of-band and are read-only
//! to this service.

use bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for sheet registrations
pub const SHEETS_COLLECTION: &str = "sheets";

/// A (spreadsheet id, display name) pair designating a sync destination
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SheetRegistration {
    pub spreadsheet_id: String,
    pub spreadsheet_name: String,
}

impl IntoIndexes for SheetRegistration {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        Vec::new()
    }
}
