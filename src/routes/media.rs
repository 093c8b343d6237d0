//! Media upload and retrieval
//!
//! Uploads carry the raw file bytes in the request body, with
//! `submission_id`, `file_type` and `filename` as query parameters and the
//! MIME type in Content-Type. The stored object's public URL is appended to
//! the submission's media list with a single atomic update; the spreadsheet
//! row only picks the URLs up on the submission's next update.

use bson::doc;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::schemas::{SubmissionDoc, SUBMISSIONS_COLLECTION};
use crate::routes::{
    authenticate, data_message_response, failure_response, message_response, query_param, BoxBody,
};
use crate::server::http::to_boxed;
use crate::server::AppState;
use crate::storage::media::extension;
use crate::storage::MediaKind;
use crate::types::{Error, Result};

/// Uploads against ids with this prefix are not attached to any submission
/// (the client uploads before the submission exists, then sends the URLs in
/// the create payload)
const TEMP_ID_PREFIX: &str = "temp_";

/// POST /media/upload
pub async fn handle_upload(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    if let Err(e) = authenticate(&req, &state).await {
        return to_boxed(failure_response(&e));
    }

    let query = req.uri().query().map(|q| q.to_string());
    let query = query.as_deref();

    let submission_id = match query_param(query, "submission_id") {
        Some(id) if !id.is_empty() => id,
        _ => {
            return to_boxed(failure_response(&Error::Validation(
                "submission_id is required".to_string(),
            )))
        }
    };

    let kind = match query_param(query, "file_type").as_deref().and_then(MediaKind::parse) {
        Some(k) => k,
        None => {
            return to_boxed(failure_response(&Error::Validation(
                "file_type must be image, video or audio".to_string(),
            )))
        }
    };

    let filename = match query_param(query, "filename") {
        Some(f) if !f.is_empty() => f,
        _ => {
            return to_boxed(failure_response(&Error::Validation(
                "filename is required".to_string(),
            )))
        }
    };

    if !kind.allows_filename(&filename) {
        return to_boxed(failure_response(&Error::Validation(format!(
            "Unsupported file type for {}",
            kind.as_str()
        ))));
    }

    let content_type = req
        .headers()
        .get("Content-Type")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return to_boxed(failure_response(&Error::Validation(format!(
                "Failed to read request body: {}",
                e
            ))))
        }
    };

    if body.is_empty() {
        return to_boxed(failure_response(&Error::Validation(
            "No file uploaded".to_string(),
        )));
    }

    // Object name: {submission}/{uuid}_{timestamp}{ext}
    let ext = extension(&filename).unwrap_or_default();
    let object = format!(
        "{}/{}_{}.{}",
        submission_id,
        Uuid::new_v4(),
        Utc::now().format("%Y%m%d_%H%M%S"),
        ext
    );

    let url = match state.storage.upload(&object, &content_type, body.to_vec()).await {
        Ok(url) => url,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    info!(object = %object, kind = kind.as_str(), "Media uploaded");

    if !submission_id.starts_with(TEMP_ID_PREFIX) {
        if let Err(e) = attach_media(&state, &submission_id, &url, kind).await {
            return to_boxed(failure_response(&e));
        }
    }

    to_boxed(data_message_response(
        StatusCode::OK,
        serde_json::json!({
            "filename": object,
            "url": url,
            "file_type": kind.as_str(),
        }),
        "Media uploaded successfully",
    ))
}

/// GET /media/{filename} - redirect to the public object URL
pub fn handle_get(state: &Arc<AppState>, filename: &str) -> Response<Full<Bytes>> {
    let url = state.storage.public_url(filename);

    Response::builder()
        .status(StatusCode::PERMANENT_REDIRECT)
        .header("Location", url)
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// DELETE /media/{filename} - admin only
pub async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    filename: &str,
) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if !user.role.is_admin() {
        return to_boxed(failure_response(&Error::Forbidden));
    }

    if let Err(e) = state.storage.delete(filename).await {
        return to_boxed(failure_response(&e));
    }

    info!(object = %filename, user = %user.id, "Media deleted");

    to_boxed(message_response("Media deleted successfully"))
}

/// Append the uploaded URL to the kind-appropriate media list.
///
/// One atomic update per attach: concurrent attaches to the same submission
/// serialize at the store, so no URL is lost to a lost update.
async fn attach_media(
    state: &Arc<AppState>,
    submission_id: &str,
    url: &str,
    kind: MediaKind,
) -> Result<()> {
    let list_field = match kind {
        MediaKind::Image => "images",
        MediaKind::Video => "videos",
        MediaKind::Audio => "audio",
    };

    let collection = state
        .mongo
        .collection::<SubmissionDoc>(SUBMISSIONS_COLLECTION)
        .await?;

    let updated_at = bson::to_bson(&Utc::now())
        .map_err(|e| Error::Internal(format!("timestamp encode failed: {}", e)))?;

    let updated = collection
        .find_one_and_update(
            doc! { "id": submission_id },
            doc! {
                "$push": { list_field: url },
                "$set": { "updated_at": updated_at },
            },
        )
        .await?;

    match updated {
        Some(_) => Ok(()),
        None => Err(Error::NotFound("submission")),
    }
}
