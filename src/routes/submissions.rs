//! Submission CRUD and CSV export

use bson::{doc, Bson, Document};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::schemas::submission::{GeoPoint, PlantConditions, TraitMeasurements, STATUS_SUBMITTED};
use crate::db::schemas::{
    FieldDoc, SubmissionDoc, UserDoc, FIELDS_COLLECTION, SUBMISSIONS_COLLECTION,
};
use crate::routes::auth_routes::read_json;
use crate::routes::{
    authenticate, data_message_response, data_response, failure_response, message_response,
    query_param, BoxBody,
};
use crate::server::http::to_boxed;
use crate::server::AppState;
use crate::sheets::codec::{encode_row, HEADER};
use crate::sheets::SyncJob;
use crate::types::{Error, Result};

/// Field id sentinel for submissions not linked to a registered field
pub const FIELD_ID_OTHERS: &str = "others";

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSubmissionRequest {
    #[serde(default)]
    pub field_id: String,
    #[serde(default)]
    pub other_field_name: String,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub growth_stage: String,
    #[serde(default)]
    pub plant_conditions: PlantConditions,
    #[serde(default)]
    pub trait_measurements: TraitMeasurements,
    #[serde(default)]
    pub coordinates: GeoPoint,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub observer_name: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub audio: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSubmissionRequest {
    pub field_id: Option<String>,
    pub other_field_name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub growth_stage: Option<String>,
    pub plant_conditions: Option<PlantConditions>,
    pub trait_measurements: Option<TraitMeasurements>,
    pub coordinates: Option<GeoPoint>,
    pub notes: Option<String>,
    pub images: Option<Vec<String>>,
    pub videos: Option<Vec<String>>,
    pub audio: Option<Vec<String>>,
    pub status: Option<String>,
}

/// Field details embedded in submission responses
#[derive(Debug, Clone, Serialize)]
pub struct FieldInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
    pub coordinates: GeoPoint,
    pub area: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rice_variety: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tentative_date: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub owner_id: String,
}

impl From<&FieldDoc> for FieldInfo {
    fn from(field: &FieldDoc) -> Self {
        Self {
            id: field.id.clone(),
            name: field.name.clone(),
            location: field.location.clone(),
            coordinates: field.coordinates,
            area: field.area,
            rice_variety: field.rice_variety.clone(),
            tentative_date: field.tentative_date.clone(),
            owner_id: field.owner_id.clone(),
        }
    }
}

impl FieldInfo {
    /// Placeholder for submissions with a free-text field name
    fn unregistered(name: &str) -> Self {
        Self {
            id: FIELD_ID_OTHERS.to_string(),
            name: name.to_string(),
            location: String::new(),
            coordinates: GeoPoint::default(),
            area: 0.0,
            rice_variety: String::new(),
            tentative_date: String::new(),
            owner_id: String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    #[serde(flatten)]
    pub submission: SubmissionDoc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldInfo>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /submissions
pub async fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let query = req.uri().query();
    let page = query_param(query, "page")
        .and_then(|p| p.parse::<u64>().ok())
        .filter(|&p| p >= 1)
        .unwrap_or(1);
    let limit = query_param(query, "limit")
        .and_then(|l| l.parse::<i64>().ok())
        .filter(|&l| l >= 1)
        .unwrap_or(20);
    let status = query_param(query, "status");

    let mut filter = Document::new();
    if !user.role.is_admin() {
        filter.insert("user_id", &user.id);
    }
    if let Some(status) = status {
        filter.insert("status", status);
    }

    let submissions = match fetch_page(&state, filter, page, limit).await {
        Ok(s) => s,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let fields = match fetch_fields_for(&state, &submissions).await {
        Ok(f) => f,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let total = submissions.len();
    let responses: Vec<SubmissionResponse> = submissions
        .into_iter()
        .map(|submission| {
            let field = fields.get(&submission.field_id).cloned();
            SubmissionResponse { submission, field }
        })
        .collect();

    to_boxed(data_response(
        StatusCode::OK,
        serde_json::json!({
            "submissions": responses,
            "page": page,
            "limit": limit,
            "total": total,
        }),
    ))
}

/// POST /submissions
pub async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let body: CreateSubmissionRequest = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let date = match validate_create(&body) {
        Ok(d) => d,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let now = Utc::now();
    let submission = SubmissionDoc {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        field_id: body.field_id,
        other_field_name: body.other_field_name,
        coordinates: body.coordinates,
        date,
        growth_stage: body.growth_stage,
        plant_conditions: body.plant_conditions,
        trait_measurements: body.trait_measurements,
        notes: body.notes,
        observer_name: body.observer_name,
        images: body.images,
        videos: body.videos,
        audio: body.audio,
        status: STATUS_SUBMITTED.to_string(),
        created_at: now,
        updated_at: now,
    };

    let collection = match state
        .mongo
        .collection::<SubmissionDoc>(SUBMISSIONS_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if let Err(e) = collection.insert_one(&submission).await {
        return to_boxed(failure_response(&e));
    }

    info!(submission = %submission.id, user = %user.id, "Submission created");

    let field_name = resolve_field_name(&state, &submission).await;
    state.sync_queue.enqueue(SyncJob::Append {
        submission: submission.clone(),
        field_name,
    });

    to_boxed(data_message_response(
        StatusCode::CREATED,
        submission,
        "Submission created successfully",
    ))
}

/// GET /submissions/{id}
pub async fn handle_get(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let submission = match fetch_owned(&state, id, &user).await {
        Ok(s) => s,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let field = match embed_field(&state, &submission).await {
        Ok(f) => f,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    to_boxed(data_response(
        StatusCode::OK,
        SubmissionResponse { submission, field },
    ))
}

/// PUT /submissions/{id}
pub async fn handle_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let body: UpdateSubmissionRequest = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if let Err(e) = fetch_owned(&state, id, &user).await {
        return to_boxed(failure_response(&e));
    }

    let set = match build_update_doc(&body) {
        Ok(s) => s,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let collection = match state
        .mongo
        .collection::<SubmissionDoc>(SUBMISSIONS_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if let Err(e) = collection.update_one(doc! { "id": id }, doc! { "$set": set }).await {
        return to_boxed(failure_response(&e));
    }

    // Re-read so the response and the sync job see the stored state
    let updated = match collection.find_one(doc! { "id": id }).await {
        Ok(Some(s)) => s,
        Ok(None) => return to_boxed(failure_response(&Error::NotFound("submission"))),
        Err(e) => return to_boxed(failure_response(&e)),
    };

    info!(submission = %updated.id, user = %user.id, "Submission updated");

    let field_name = resolve_field_name(&state, &updated).await;
    state.sync_queue.enqueue(SyncJob::Update {
        submission: updated.clone(),
        field_name,
    });

    to_boxed(data_message_response(
        StatusCode::OK,
        updated,
        "Submission updated successfully",
    ))
}

/// DELETE /submissions/{id}
///
/// Spreadsheet rows and stored media are intentionally left behind.
pub async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if let Err(e) = fetch_owned(&state, id, &user).await {
        return to_boxed(failure_response(&e));
    }

    let collection = match state
        .mongo
        .collection::<SubmissionDoc>(SUBMISSIONS_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if let Err(e) = collection.delete_one(doc! { "id": id }).await {
        return to_boxed(failure_response(&e));
    }

    info!(submission = %id, user = %user.id, "Submission deleted");

    to_boxed(message_response("Submission deleted successfully"))
}

/// GET /submissions/export
///
/// Streams every accessible submission as CSV in the spreadsheet column
/// order, in store iteration order.
pub async fn handle_export(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let mut filter = Document::new();
    if !user.role.is_admin() {
        filter.insert("user_id", &user.id);
    }

    let collection = match state
        .mongo
        .collection::<SubmissionDoc>(SUBMISSIONS_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let submissions = match collection.find_many(filter).await {
        Ok(s) => s,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let mut csv = String::new();
    let header: Vec<String> = HEADER.iter().map(|h| h.to_string()).collect();
    csv.push_str(&csv_line(&header));

    // Field names resolved per referenced field, cached across rows
    let mut field_names: HashMap<String, String> = HashMap::new();
    let fields = match state.mongo.collection::<FieldDoc>(FIELDS_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    for submission in &submissions {
        let field_name = if submission.field_id.is_empty() {
            String::new()
        } else if let Some(name) = field_names.get(&submission.field_id) {
            name.clone()
        } else {
            let name = fields
                .find_one(doc! { "id": &submission.field_id })
                .await
                .ok()
                .flatten()
                .map(|f| f.name)
                .unwrap_or_default();
            field_names.insert(submission.field_id.clone(), name.clone());
            name
        };

        csv.push_str(&csv_line(&encode_row(submission, &field_name)));
    }

    to_boxed(
        Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/csv")
            .header("Content-Disposition", "attachment; filename=submissions.csv")
            .header("Access-Control-Allow-Origin", "*")
            .body(Full::new(Bytes::from(csv)))
            .unwrap(),
    )
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_create(body: &CreateSubmissionRequest) -> Result<DateTime<Utc>> {
    let date = body
        .date
        .ok_or_else(|| Error::Validation("date is required".to_string()))?;
    if body.growth_stage.is_empty() {
        return Err(Error::Validation("growth_stage is required".to_string()));
    }
    if body.observer_name.is_empty() {
        return Err(Error::Validation("observer_name is required".to_string()));
    }
    Ok(date)
}

/// Build the partial-update document; only fields present in the payload are
/// touched, and updated_at is always refreshed.
fn build_update_doc(body: &UpdateSubmissionRequest) -> Result<Document> {
    let mut set = Document::new();

    if let Some(ref date) = body.date {
        set.insert("date", to_bson(date)?);
    }
    if let Some(ref growth_stage) = body.growth_stage {
        set.insert("growth_stage", growth_stage);
    }
    if let Some(ref plant_conditions) = body.plant_conditions {
        set.insert("plant_conditions", to_bson(plant_conditions)?);
    }
    if let Some(ref trait_measurements) = body.trait_measurements {
        set.insert("trait_measurements", to_bson(trait_measurements)?);
    }
    if let Some(ref coordinates) = body.coordinates {
        set.insert("coordinates", to_bson(coordinates)?);
    }
    if let Some(ref notes) = body.notes {
        set.insert("notes", notes);
    }
    if let Some(ref images) = body.images {
        set.insert("images", images.clone());
    }
    if let Some(ref videos) = body.videos {
        set.insert("videos", videos.clone());
    }
    if let Some(ref audio) = body.audio {
        set.insert("audio", audio.clone());
    }
    if let Some(ref status) = body.status {
        set.insert("status", status);
    }

    // A free-text field name detaches the submission from any registered field
    if let Some(ref other_field_name) = body.other_field_name {
        set.insert("other_field_name", other_field_name);
        set.insert("field_id", FIELD_ID_OTHERS);
    } else if let Some(ref field_id) = body.field_id {
        set.insert("field_id", field_id);
    }

    set.insert("updated_at", to_bson(&Utc::now())?);

    Ok(set)
}

fn to_bson<T: Serialize>(value: &T) -> Result<Bson> {
    bson::to_bson(value).map_err(|e| Error::Internal(format!("BSON encode failed: {}", e)))
}

/// Only the creator or an admin may see or touch a submission
fn ownership_allows(user: &UserDoc, submission: &SubmissionDoc) -> bool {
    user.role.is_admin() || submission.user_id == user.id
}

/// Fetch a submission and enforce the ownership rule
async fn fetch_owned(state: &Arc<AppState>, id: &str, user: &UserDoc) -> Result<SubmissionDoc> {
    let collection = state
        .mongo
        .collection::<SubmissionDoc>(SUBMISSIONS_COLLECTION)
        .await?;

    let submission = collection
        .find_one(doc! { "id": id })
        .await?
        .ok_or(Error::NotFound("submission"))?;

    if !ownership_allows(user, &submission) {
        return Err(Error::Forbidden);
    }

    Ok(submission)
}

async fn fetch_page(
    state: &Arc<AppState>,
    filter: Document,
    page: u64,
    limit: i64,
) -> Result<Vec<SubmissionDoc>> {
    let collection = state
        .mongo
        .collection::<SubmissionDoc>(SUBMISSIONS_COLLECTION)
        .await?;

    collection
        .inner()
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .skip((page - 1) * limit as u64)
        .limit(limit)
        .await
        .map_err(|e| Error::Database(format!("Find failed: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| Error::Database(format!("Cursor failed: {}", e)))
}

/// Bulk-load the registered fields referenced by a page of submissions
async fn fetch_fields_for(
    state: &Arc<AppState>,
    submissions: &[SubmissionDoc],
) -> Result<HashMap<String, FieldInfo>> {
    let ids: Vec<&str> = submissions
        .iter()
        .filter(|s| !s.field_id.is_empty() && s.field_id != FIELD_ID_OTHERS)
        .map(|s| s.field_id.as_str())
        .collect();

    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let fields = state.mongo.collection::<FieldDoc>(FIELDS_COLLECTION).await?;
    let docs = fields.find_many(doc! { "id": { "$in": ids } }).await?;

    Ok(docs
        .iter()
        .map(|f| (f.id.clone(), FieldInfo::from(f)))
        .collect())
}

/// Field embedded in a single-submission response
async fn embed_field(
    state: &Arc<AppState>,
    submission: &SubmissionDoc,
) -> Result<Option<FieldInfo>> {
    if !submission.field_id.is_empty() && submission.field_id != FIELD_ID_OTHERS {
        let fields = state.mongo.collection::<FieldDoc>(FIELDS_COLLECTION).await?;
        Ok(fields
            .find_one(doc! { "id": &submission.field_id })
            .await?
            .map(|f| FieldInfo::from(&f)))
    } else if !submission.other_field_name.is_empty() {
        Ok(Some(FieldInfo::unregistered(&submission.other_field_name)))
    } else {
        Ok(None)
    }
}

/// Resolve the display name written into spreadsheet rows
async fn resolve_field_name(state: &Arc<AppState>, submission: &SubmissionDoc) -> String {
    if !submission.field_id.is_empty() && submission.field_id != FIELD_ID_OTHERS {
        let fields = match state.mongo.collection::<FieldDoc>(FIELDS_COLLECTION).await {
            Ok(c) => c,
            Err(_) => return String::new(),
        };
        fields
            .find_one(doc! { "id": &submission.field_id })
            .await
            .ok()
            .flatten()
            .map(|f| f.name)
            .unwrap_or_default()
    } else {
        submission.other_field_name.clone()
    }
}

/// Encode one CSV record, quoting fields that contain separators
fn csv_line(cells: &[String]) -> String {
    let encoded: Vec<String> = cells.iter().map(|c| csv_field(c)).collect();
    let mut line = encoded.join(",");
    line.push('\n');
    line
}

fn csv_field(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') || cell.contains('\r') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_create_requires_core_fields() {
        let mut body = CreateSubmissionRequest {
            field_id: String::new(),
            other_field_name: String::new(),
            date: Some(Utc::now()),
            growth_stage: "Tillering".to_string(),
            plant_conditions: PlantConditions::default(),
            trait_measurements: TraitMeasurements::default(),
            coordinates: GeoPoint::default(),
            notes: String::new(),
            observer_name: "Alice".to_string(),
            images: vec![],
            videos: vec![],
            audio: vec![],
        };
        assert!(validate_create(&body).is_ok());

        body.observer_name.clear();
        let err = validate_create(&body).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        body.observer_name = "Alice".to_string();
        body.date = None;
        assert!(validate_create(&body).is_err());

        body.date = Some(Utc::now());
        body.growth_stage.clear();
        assert!(validate_create(&body).is_err());
    }

    #[test]
    fn test_update_doc_touches_only_present_fields() {
        let body = UpdateSubmissionRequest {
            notes: Some("after typhoon".to_string()),
            ..Default::default()
        };

        let set = build_update_doc(&body).unwrap();
        assert_eq!(set.get_str("notes").unwrap(), "after typhoon");
        assert!(set.contains_key("updated_at"));
        assert!(!set.contains_key("growth_stage"));
        assert!(!set.contains_key("status"));
    }

    #[test]
    fn test_other_field_name_forces_sentinel_field_id() {
        let body = UpdateSubmissionRequest {
            other_field_name: Some("Backyard plot".to_string()),
            field_id: Some("field-1".to_string()),
            ..Default::default()
        };

        let set = build_update_doc(&body).unwrap();
        assert_eq!(set.get_str("field_id").unwrap(), FIELD_ID_OTHERS);
        assert_eq!(set.get_str("other_field_name").unwrap(), "Backyard plot");
    }

    #[test]
    fn test_ownership_rule() {
        use crate::auth::Role;
        use chrono::TimeZone;

        let date = Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap();
        let submission = SubmissionDoc {
            id: "sub-1".to_string(),
            user_id: "owner".to_string(),
            field_id: String::new(),
            other_field_name: String::new(),
            coordinates: GeoPoint::default(),
            date,
            growth_stage: "Tillering".to_string(),
            plant_conditions: PlantConditions::default(),
            trait_measurements: TraitMeasurements::default(),
            notes: String::new(),
            observer_name: "Alice".to_string(),
            images: vec![],
            videos: vec![],
            audio: vec![],
            status: "submitted".to_string(),
            created_at: date,
            updated_at: date,
        };

        let owner = UserDoc::new("owner".into(), "o@x.com".into(), "O".into(), String::new());
        let stranger = UserDoc::new("other".into(), "s@x.com".into(), "S".into(), String::new());
        let mut admin = UserDoc::new("admin".into(), "a@x.com".into(), "A".into(), String::new());
        admin.role = Role::Admin;

        assert!(ownership_allows(&owner, &submission));
        assert!(!ownership_allows(&stranger, &submission));
        assert!(ownership_allows(&admin, &submission));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_csv_line_width_matches_header() {
        let header: Vec<String> = HEADER.iter().map(|h| h.to_string()).collect();
        let line = csv_line(&header);
        assert_eq!(line.matches(',').count(), HEADER.len() - 1);
        assert!(line.ends_with('\n'));
    }
}
