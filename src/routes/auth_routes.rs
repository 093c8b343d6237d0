//! HTTP routes for authentication
//!
//! - POST /auth/google  - Verify a Google access token, get a JWT pair
//! - POST /auth/refresh - Exchange a refresh token for a new pair
//! - POST /auth/logout  - Stateless logout
//! - GET  /auth/me      - Current user from token

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::schemas::{UserDoc, USERS_COLLECTION};
use crate::routes::{
    authenticate, data_response, failure_response, json_response, message_response, BoxBody,
    ErrorResponse,
};
use crate::server::http::to_boxed;
use crate::server::AppState;
use crate::types::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct GoogleTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Authentication response: the user plus a token pair
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserDoc,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Handle auth-related HTTP requests (path is relative to the API prefix)
pub async fn handle_auth_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<BoxBody> {
    let method = req.method().clone();

    let response = match (method, path) {
        (Method::POST, "/auth/google") => handle_google(req, state).await,
        (Method::POST, "/auth/refresh") => handle_refresh(req, state).await,
        (Method::POST, "/auth/logout") => handle_logout(req, state).await,
        (Method::GET, "/auth/me") => handle_me(req, state).await,

        (_, "/auth/google") | (_, "/auth/refresh") | (_, "/auth/logout") | (_, "/auth/me") => {
            json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &ErrorResponse {
                    error: "method_not_allowed".to_string(),
                    message: "Method not allowed".to_string(),
                },
            )
        }

        _ => json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse {
                error: "not_found".to_string(),
                message: "Auth endpoint not found".to_string(),
            },
        ),
    };

    to_boxed(response)
}

/// POST /auth/google
///
/// Verifies the client-supplied Google access token, then gets or creates
/// the user keyed by the verified email.
async fn handle_google(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let body: GoogleTokenRequest = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return failure_response(&e),
    };

    let token_info = match state.google.verify(&body.token).await {
        Ok(info) => info,
        Err(e) => return failure_response(&e),
    };

    let user = match get_or_create_user(&state, &token_info.email).await {
        Ok(u) => u,
        Err(e) => return failure_response(&e),
    };

    let pair = match state.jwt.issue_pair(&user) {
        Ok(p) => p,
        Err(e) => return failure_response(&e),
    };

    // Best-effort last-login stamp
    if let Err(e) = touch_last_login(&state, &user.id).await {
        warn!(user = %user.id, "Failed to update last login: {}", e);
    }

    info!(user = %user.id, email = %user.email, "User logged in via Google");

    json_response(
        StatusCode::OK,
        &AuthResponse {
            user,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
        },
    )
}

/// POST /auth/refresh
async fn handle_refresh(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let body: RefreshTokenRequest = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return failure_response(&e),
    };

    let claims = match state.jwt.verify(&body.refresh_token) {
        Ok(c) => c,
        Err(_) => {
            return failure_response(&Error::Unauthorized("Invalid refresh token".to_string()))
        }
    };

    let users = match state.mongo.collection::<UserDoc>(USERS_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return failure_response(&e),
    };

    let user = match users.find_one(bson::doc! { "id": &claims.user_id }).await {
        Ok(Some(u)) => u,
        Ok(None) => return failure_response(&Error::NotFound("user")),
        Err(e) => return failure_response(&e),
    };

    let pair = match state.jwt.issue_pair(&user) {
        Ok(p) => p,
        Err(e) => return failure_response(&e),
    };

    json_response(
        StatusCode::OK,
        &AuthResponse {
            user,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
        },
    )
}

/// POST /auth/logout
///
/// Tokens are not blacklisted; the client simply discards them.
async fn handle_logout(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    if let Err(e) = authenticate(&req, &state).await {
        return failure_response(&e);
    }
    message_response("Logged out successfully")
}

/// GET /auth/me
async fn handle_me(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    match authenticate(&req, &state).await {
        Ok(user) => data_response(StatusCode::OK, user),
        Err(e) => failure_response(&e),
    }
}

/// Read and parse a JSON request body
pub async fn read_json<T: serde::de::DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let body = req
        .collect()
        .await
        .map_err(|e| Error::Validation(format!("Failed to read request body: {}", e)))?
        .to_bytes();

    serde_json::from_slice(&body).map_err(|e| Error::Validation(format!("Invalid JSON: {}", e)))
}

async fn get_or_create_user(state: &Arc<AppState>, email: &str) -> Result<UserDoc> {
    let users = state.mongo.collection::<UserDoc>(USERS_COLLECTION).await?;

    if let Some(user) = users.find_one(bson::doc! { "email": email }).await? {
        return Ok(user);
    }

    // First login: create with the default observer role. Name and picture
    // start from the email; the user can change them later.
    let user = UserDoc::new(
        Uuid::new_v4().to_string(),
        email.to_string(),
        email.to_string(),
        String::new(),
    );
    users.insert_one(&user).await?;
    info!(user = %user.id, email = %email, "Created new user");

    Ok(user)
}

async fn touch_last_login(state: &Arc<AppState>, user_id: &str) -> Result<()> {
    let users = state.mongo.collection::<UserDoc>(USERS_COLLECTION).await?;
    users
        .update_one(
            bson::doc! { "id": user_id },
            bson::doc! { "$set": { "last_login_at": bson::to_bson(&chrono::Utc::now())
                .map_err(|e| Error::Internal(format!("timestamp encode failed: {}", e)))? } },
        )
        .await?;
    Ok(())
}
