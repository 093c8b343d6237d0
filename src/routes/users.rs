//! User management
//!
//! Users see and edit themselves; admins manage everyone. Role changes are
//! admin-only.

use bson::{doc, Document};
use chrono::Utc;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::Role;
use crate::db::schemas::{UserDoc, USERS_COLLECTION};
use crate::routes::auth_routes::read_json;
use crate::routes::{
    authenticate, data_message_response, data_response, failure_response, message_response,
    BoxBody,
};
use crate::server::http::to_boxed;
use crate::server::AppState;
use crate::types::{Error, Result};

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub picture: Option<String>,
    pub role: Option<Role>,
}

/// GET /users/{id} - self or admin
pub async fn handle_get(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let requester = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if !requester.role.is_admin() && requester.id != id {
        return to_boxed(failure_response(&Error::Forbidden));
    }

    match fetch_user(&state, id).await {
        Ok(user) => to_boxed(data_response(StatusCode::OK, user)),
        Err(e) => to_boxed(failure_response(&e)),
    }
}

/// PUT /users/{id} - self or admin; role changes admin-only
pub async fn handle_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let requester = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if !requester.role.is_admin() && requester.id != id {
        return to_boxed(failure_response(&Error::Forbidden));
    }

    let body: UpdateUserRequest = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if body.role.is_some() && !requester.role.is_admin() {
        return to_boxed(failure_response(&Error::Forbidden));
    }

    if let Err(e) = fetch_user(&state, id).await {
        return to_boxed(failure_response(&e));
    }

    let mut set = Document::new();
    if let Some(ref name) = body.name {
        set.insert("name", name);
    }
    if let Some(ref picture) = body.picture {
        set.insert("picture", picture);
    }
    if let Some(role) = body.role {
        set.insert("role", role.to_string());
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

    let collection = match state.mongo.collection::<UserDoc>(USERS_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if let Err(e) = collection.update_one(doc! { "id": id }, doc! { "$set": set }).await {
        return to_boxed(failure_response(&e));
    }

    match fetch_user(&state, id).await {
        Ok(updated) => to_boxed(data_message_response(
            StatusCode::OK,
            updated,
            "User updated successfully",
        )),
        Err(e) => to_boxed(failure_response(&e)),
    }
}

/// DELETE /users/{id} - admin only
pub async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let requester = match authenticate(&req, &state).await {
        Ok(u) => u,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    if !requester.role.is_admin() {
        return to_boxed(failure_response(&Error::Forbidden));
    }

    let collection = match state.mongo.collection::<UserDoc>(USERS_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return to_boxed(failure_response(&e)),
    };

    match collection.delete_one(doc! { "id": id }).await {
        Ok(result) if result.deleted_count == 0 => {
            to_boxed(failure_response(&Error::NotFound("user")))
        }
        Ok(_) => {
            info!(user = %id, admin = %requester.id, "User deleted");
            to_boxed(message_response("User deleted successfully"))
        }
        Err(e) => to_boxed(failure_response(&e)),
    }
}

async fn fetch_user(state: &Arc<AppState>, id: &str) -> Result<UserDoc> {
    let collection = state.mongo.collection::<UserDoc>(USERS_COLLECTION).await?;
    collection
        .find_one(doc! { "id": id })
        .await?
        .ok_or(Error::NotFound("user"))
}
