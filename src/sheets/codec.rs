//! Spreadsheet row codec
//!
//! Pure transform from a submission into the fixed-order row of string cells
//! written to every registered spreadsheet. The column order must match
//! [`HEADER`] exactly; the CSV export reuses the same shape.

use std::collections::BTreeMap;

use crate::db::schemas::SubmissionDoc;

/// Column order of the published header row
pub const HEADER: [&str; 39] = [
    "ID",
    "UserID",
    "FieldID",
    "FieldName",
    "Date",
    "GrowthStage",
    "Notes",
    "ObserverName",
    "Status",
    "CreatedAt",
    "UpdatedAt",
    "Latitude",
    "Longitude",
    "CulmLength",
    "PanicleLength",
    "PaniclesPerHill",
    "HillsObserved",
    "Healthy",
    "Unhealthy",
    "SignsOfPestInfestation",
    "PestDetails",
    "OtherPest",
    "SignsOfNutrientDeficiency",
    "NutrientDeficiencyDetails",
    "OtherNutrient",
    "WaterStress",
    "WaterStressLevel",
    "Lodging",
    "LodgingLevel",
    "WeedInfestation",
    "WeedInfestationLevel",
    "DiseaseSymptoms",
    "DiseaseDetails",
    "OtherDisease",
    "Other",
    "OtherConditionText",
    "Images",
    "Videos",
    "Audio",
];

/// Encode a submission into one row of cells, in [`HEADER`] order.
///
/// `field_name` is the resolved display name: the registered field's name, or
/// the submission's free-text field name when it is not linked to one.
/// Media URL lists are comma-joined with no escaping; a literal comma inside
/// a URL corrupts that cell (known limitation, kept as-is).
pub fn encode_row(submission: &SubmissionDoc, field_name: &str) -> Vec<String> {
    let pc = &submission.plant_conditions;
    let tm = &submission.trait_measurements;

    vec![
        submission.id.clone(),
        submission.user_id.clone(),
        submission.field_id.clone(),
        field_name.to_string(),
        format_date(submission),
        submission.growth_stage.clone(),
        submission.notes.clone(),
        submission.observer_name.clone(),
        submission.status.clone(),
        submission
            .created_at
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        submission
            .updated_at
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        format!("{:.6}", submission.coordinates.latitude),
        format!("{:.6}", submission.coordinates.longitude),
        format!("{:.6}", tm.culm_length),
        format!("{:.6}", tm.panicle_length),
        tm.panicles_per_hill.to_string(),
        tm.hills_observed.to_string(),
        pc.healthy.to_string(),
        pc.unhealthy.to_string(),
        pc.signs_of_pest_infestation.to_string(),
        selected_keys(&pc.pest_details),
        pc.other_pest.clone(),
        pc.signs_of_nutrient_deficiency.to_string(),
        selected_keys(&pc.nutrient_deficiency_details),
        pc.other_nutrient.clone(),
        pc.water_stress.to_string(),
        pc.water_stress_level.clone(),
        pc.lodging.to_string(),
        pc.lodging_level.clone(),
        pc.weed_infestation.to_string(),
        pc.weed_infestation_level.clone(),
        pc.disease_symptoms.to_string(),
        selected_keys(&pc.disease_details),
        pc.other_disease.clone(),
        pc.other.to_string(),
        pc.other_condition_text.clone(),
        submission.images.join(","),
        submission.videos.join(","),
        submission.audio.join(","),
    ]
}

fn format_date(submission: &SubmissionDoc) -> String {
    submission
        .date
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Comma-space-joined list of the keys whose value is true.
///
/// The map is ordered, so selected sub-conditions always render in
/// lexicographic order.
fn selected_keys(map: &BTreeMap<String, bool>) -> String {
    map.iter()
        .filter(|(_, &selected)| selected)
        .map(|(key, _)| key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::submission::{GeoPoint, PlantConditions, TraitMeasurements};
    use chrono::TimeZone;

    fn sample_submission() -> SubmissionDoc {
        let date = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap();
        SubmissionDoc {
            id: "sub-1".to_string(),
            user_id: "user-1".to_string(),
            field_id: "field-1".to_string(),
            other_field_name: String::new(),
            coordinates: GeoPoint {
                latitude: 14.5995,
                longitude: 120.9842,
            },
            date,
            growth_stage: "Tillering".to_string(),
            plant_conditions: PlantConditions::default(),
            trait_measurements: TraitMeasurements {
                culm_length: 85.5,
                panicle_length: 0.0,
                panicles_per_hill: 12,
                hills_observed: 20,
            },
            notes: "after rain".to_string(),
            observer_name: "Alice".to_string(),
            images: vec![],
            videos: vec![],
            audio: vec![],
            status: "submitted".to_string(),
            created_at: date,
            updated_at: date,
        }
    }

    #[test]
    fn test_row_matches_header_width() {
        let row = encode_row(&sample_submission(), "North paddy");
        assert_eq!(row.len(), HEADER.len());
    }

    #[test]
    fn test_row_width_with_everything_populated() {
        let mut submission = sample_submission();
        submission.plant_conditions.signs_of_pest_infestation = true;
        submission
            .plant_conditions
            .pest_details
            .insert("Stem borer".to_string(), true);
        submission.plant_conditions.other_pest = "unknown beetle".to_string();
        submission.images = vec!["https://x/1.jpg".to_string(), "https://x/2.jpg".to_string()];
        submission.videos = vec!["https://x/v.mp4".to_string()];
        submission.audio = vec!["https://x/a.mp3".to_string()];

        let row = encode_row(&submission, "North paddy");
        assert_eq!(row.len(), HEADER.len());
        assert_eq!(row[36], "https://x/1.jpg,https://x/2.jpg");
    }

    #[test]
    fn test_column_positions() {
        let row = encode_row(&sample_submission(), "North paddy");
        assert_eq!(row[0], "sub-1");
        assert_eq!(row[3], "North paddy");
        assert_eq!(row[4], "2024-03-01T06:30:00Z");
        assert_eq!(row[8], "submitted");
        assert_eq!(row[11], "14.599500");
        assert_eq!(row[12], "120.984200");
        assert_eq!(row[13], "85.500000");
        assert_eq!(row[15], "12");
        assert_eq!(row[17], "false");
    }

    #[test]
    fn test_detail_maps_render_in_lexicographic_order() {
        let mut submission = sample_submission();
        let details = &mut submission.plant_conditions.pest_details;
        details.insert("Stem borer".to_string(), true);
        details.insert("Armyworm".to_string(), true);
        details.insert("Rice bug".to_string(), false);
        details.insert("Leaf folder".to_string(), true);

        let row = encode_row(&submission, "North paddy");
        assert_eq!(row[20], "Armyworm, Leaf folder, Stem borer");
    }

    #[test]
    fn test_booleans_render_as_literals() {
        let mut submission = sample_submission();
        submission.plant_conditions.healthy = true;
        submission.plant_conditions.unhealthy = true;

        let row = encode_row(&submission, "North paddy");
        assert_eq!(row[17], "true");
        assert_eq!(row[18], "true");
    }

    #[test]
    fn test_comma_inside_url_corrupts_naive_split() {
        // Media URLs are comma-joined with no escaping. A URL containing a
        // literal comma makes the flattened row un-splittable, which the
        // export path inherits.
        let mut submission = sample_submission();
        submission.images = vec!["https://x/a,b.jpg".to_string()];

        let row = encode_row(&submission, "North paddy");
        let flattened = row.join(",");
        let naive_cells = flattened.split(',').count();
        assert!(naive_cells > HEADER.len());
    }
}
