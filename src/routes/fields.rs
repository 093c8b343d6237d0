//! Field management

use bson::{doc, Document};
use chrono::Utc;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::schemas::submission::GeoPoint;
use crate::db::schemas::{FieldDoc, FIELDS_COLLECTION};
use crate::routes::auth_routes::read_json;
use crate::routes::{
    authenticate, data_message_response, data_response, failure_response, message_response,
    BoxBody,
};
use crate::server::http::to_boxed;
use crate::server::AppState;
use crate::types::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct CreateFieldRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub rice_variety: String,
    #[serde(default)]
    pub tentative_date: String,
    #[serde(default)]
    pub coordinates: GeoPoint,
    #[serde(default)]
    pub area: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateFieldRequest {
    pub name: Option<String>,
    pub location: Option<String>,
    pub rice_variety: Option<String>,
    pub tentative_date: Option<String>,
    pub coordinates: Option<GeoPoint>,
    pub area: Option<f64>,
}

/// GET /fields - fields are shared references, visible to every
/// authenticated user
pub async fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    if let Err(e) = authenticate(&req, &state).await {
        return to_boxed(failure_response(&e));
    }

    let collection = match state.mongo.collection::<FieldDoc>(FIELDS_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    match collection.find_many(doc! {}).await {
        Ok(fields) => to_boxed(data_response(StatusCode::OK, fields)),
        Err(e) => to_boxed(failure_response(&e)),
    }
}

/// POST /fields
pub async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let body: CreateFieldRequest = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if body.name.is_empty() {
        return to_boxed(failure_response(&Error::Validation(
            "name is required".to_string(),
        )));
    }
    if body.location.is_empty() {
        return to_boxed(failure_response(&Error::Validation(
            "location is required".to_string(),
        )));
    }

    let now = Utc::now();
    let field = FieldDoc {
        id: Uuid::new_v4().to_string(),
        name: body.name,
        location: body.location,
        coordinates: body.coordinates,
        area: body.area,
        rice_variety: body.rice_variety,
        tentative_date: body.tentative_date,
        owner_id: user.id.clone(),
        created_at: now,
        updated_at: now,
    };

    let collection = match state.mongo.collection::<FieldDoc>(FIELDS_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if let Err(e) = collection.insert_one(&field).await {
        return to_boxed(failure_response(&e));
    }

    info!(field = %field.id, user = %user.id, "Field created");

    to_boxed(data_message_response(
        StatusCode::CREATED,
        field,
        "Field created successfully",
    ))
}

/// GET /fields/{id}
pub async fn handle_get(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    if let Err(e) = authenticate(&req, &state).await {
        return to_boxed(failure_response(&e));
    }

    match fetch_field(&state, id).await {
        Ok(field) => to_boxed(data_response(StatusCode::OK, field)),
        Err(e) => to_boxed(failure_response(&e)),
    }
}

/// PUT /fields/{id} - owner or admin
pub async fn handle_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let body: UpdateFieldRequest = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let field = match fetch_field(&state, id).await {
        Ok(f) => f,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if !user.role.is_admin() && field.owner_id != user.id {
        return to_boxed(failure_response(&Error::Forbidden));
    }

    let mut set = Document::new();
    if let Some(ref name) = body.name {
        set.insert("name", name);
    }
    if let Some(ref location) = body.location {
        set.insert("location", location);
    }
    if let Some(ref rice_variety) = body.rice_variety {
        set.insert("rice_variety", rice_variety);
    }
    if let Some(ref tentative_date) = body.tentative_date {
        set.insert("tentative_date", tentative_date);
    }
    if let Some(ref coordinates) = body.coordinates {
        match bson::to_bson(coordinates) {
            Ok(b) => {
                set.insert("coordinates", b);
            }
            Err(e) => {
                return to_boxed(failure_response(&Error::Internal(format!(
                    "BSON encode failed: {}",
                    e
                ))))
            }
        }
    }
    if let Some(area) = body.area {
        set.insert("area", area);
    }
    match bson::to_bson(&Utc::now()) {
        Ok(b) => {
            set.insert("updated_at", b);
        }
        Err(e) => {
            return to_boxed(failure_response(&Error::Internal(format!(
                "BSON encode failed: {}",
                e
            ))))
        }
    }

    let collection = match state.mongo.collection::<FieldDoc>(FIELDS_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if let Err(e) = collection.update_one(doc! { "id": id }, doc! { "$set": set }).await {
        return to_boxed(failure_response(&e));
    }

    match fetch_field(&state, id).await {
        Ok(updated) => to_boxed(data_message_response(
            StatusCode::OK,
            updated,
            "Field updated successfully",
        )),
        Err(e) => to_boxed(failure_response(&e)),
    }
}

/// DELETE /fields/{id} - owner or admin
pub async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let user = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    let field = match fetch_field(&state, id).await {
        Ok(f) => f,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if !user.role.is_admin() && field.owner_id != user.id {
        return to_boxed(failure_response(&Error::Forbidden));
    }

    let collection = match state.mongo.collection::<FieldDoc>(FIELDS_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if let Err(e) = collection.delete_one(doc! { "id": id }).await {
        return to_boxed(failure_response(&e));
    }

    info!(field = %id, user = %user.id, "Field deleted");

    to_boxed(message_response("Field deleted successfully"))
}

async fn fetch_field(state: &Arc<AppState>, id: &str) -> Result<FieldDoc> {
    let collection = state.mongo.collection::<FieldDoc>(FIELDS_COLLECTION).await?;
    collection
        .find_one(doc! { "id": id })
        .await?
        .ok_or(Error::NotFound("field"))
}
