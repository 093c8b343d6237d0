//! Submission document schema
//!
//! Field names on the wire (JSON and BSON alike) follow the format the mobile
//! form already produces, including the human-readable checklist keys such as
//! `"Signs of pest infestation"`.

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::mongo::IntoIndexes;

/// Collection name for submissions
pub const SUBMISSIONS_COLLECTION: &str = "submissions";

/// Status assigned to every newly created submission
pub const STATUS_SUBMITTED: &str = "submitted";

/// GPS coordinates
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoPoint {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

/// Plant condition checklist.
///
/// The detail maps are ordered maps so that rendered rows list selected
/// sub-conditions in a stable lexicographic order.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PlantConditions {
    #[serde(rename = "Healthy", default)]
    pub healthy: bool,

    #[serde(rename = "Unhealthy", default)]
    pub unhealthy: bool,

    #[serde(rename = "Signs of pest infestation", default)]
    pub signs_of_pest_infestation: bool,

    #[serde(rename = "pestDetails", default)]
    pub pest_details: BTreeMap<String, bool>,

    #[serde(rename = "otherPest", default)]
    pub other_pest: String,

    #[serde(rename = "Signs of nutrient deficiency", default)]
    pub signs_of_nutrient_deficiency: bool,

    #[serde(rename = "nutrientDeficiencyDetails", default)]
    pub nutrient_deficiency_details: BTreeMap<String, bool>,

    #[serde(rename = "otherNutrient", default)]
    pub other_nutrient: String,

    #[serde(rename = "Water stress (drought or flood)", default)]
    pub water_stress: bool,

    #[serde(rename = "waterStressLevel", default)]
    pub water_stress_level: String,

    #[serde(rename = "Lodging (bent/broken stems)", default)]
    pub lodging: bool,

    #[serde(rename = "lodgingLevel", default)]
    pub lodging_level: String,

    #[serde(rename = "Weed infestation", default)]
    pub weed_infestation: bool,

    #[serde(rename = "weedInfestationLevel", default)]
    pub weed_infestation_level: String,

    #[serde(rename = "Disease symptoms", default)]
    pub disease_symptoms: bool,

    #[serde(rename = "diseaseDetails", default)]
    pub disease_details: BTreeMap<String, bool>,

    #[serde(rename = "otherDisease", default)]
    pub other_disease: String,

    #[serde(rename = "Other", default)]
    pub other: bool,

    #[serde(rename = "otherConditionText", default)]
    pub other_condition_text: String,
}

/// Trait measurement data, all fields optional on input and zero by default
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
pub struct TraitMeasurements {
    #[serde(default)]
    pub culm_length: f64,
    #[serde(default)]
    pub panicle_length: f64,
    #[serde(default)]
    pub panicles_per_hill: i64,
    #[serde(default)]
    pub hills_observed: i64,
}

/// A monitoring submission
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SubmissionDoc {
    /// Application-level identifier (UUID), immutable, unique
    pub id: String,

    pub user_id: String,

    /// Registered field id, empty, or the sentinel "others" when the
    /// observer typed a free-text field name instead
    #[serde(default)]
    pub field_id: String,

    #[serde(default)]
    pub other_field_name: String,

    #[serde(default)]
    pub coordinates: GeoPoint,

    pub date: DateTime<Utc>,

    pub growth_stage: String,

    #[serde(default)]
    pub plant_conditions: PlantConditions,

    #[serde(default)]
    pub trait_measurements: TraitMeasurements,

    #[serde(default)]
    pub notes: String,

    pub observer_name: String,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub videos: Vec<String>,

    #[serde(default)]
    pub audio: Vec<String>,

    /// Open string: submitted, under_review, approved, rejected
    pub status: String,

    /// Immutable after creation
    pub created_at: DateTime<Utc>,

    /// Refreshed on every mutation
    pub updated_at: DateTime<Utc>,
}

impl IntoIndexes for SubmissionDoc {
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
                doc! { "user_id": 1 },
                Some(IndexOptions::builder().name("user_id_index".to_string()).build()),
            ),
            (
                doc! { "created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("created_at_desc_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "status": 1 },
                Some(IndexOptions::builder().name("status_index".to_string()).build()),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plant_conditions_wire_names() {
        let mut pc = PlantConditions::default();
        pc.signs_of_pest_infestation = true;
        pc.pest_details.insert("Stem borer".to_string(), true);

        let json = serde_json::to_value(&pc).unwrap();
        assert_eq!(json["Signs of pest infestation"], true);
        assert_eq!(json["pestDetails"]["Stem borer"], true);
        assert_eq!(json["Water stress (drought or flood)"], false);
    }

    #[test]
    fn test_partial_conditions_deserialize_with_defaults() {
        let pc: PlantConditions = serde_json::from_str(r#"{"Healthy": true}"#).unwrap();
        assert!(pc.healthy);
        assert!(!pc.unhealthy);
        assert!(pc.pest_details.is_empty());
    }

    #[test]
    fn test_healthy_and_unhealthy_both_accepted() {
        // Mutual exclusion is only enforced in the client UI; the server
        // stores whatever the checklist says.
        let pc: PlantConditions =
            serde_json::from_str(r#"{"Healthy": true, "Unhealthy": true}"#).unwrap();
        assert!(pc.healthy && pc.unhealthy);
    }
}
