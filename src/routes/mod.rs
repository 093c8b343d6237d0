//! HTTP routes

pub mod analytics;
pub mod auth_routes;
pub mod fields;
pub mod health;
pub mod media;
pub mod submissions;
pub mod users;

pub use auth_routes::handle_auth_request;
pub use health::health_check;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::auth::extract_token_from_header;
use crate::db::schemas::{UserDoc, USERS_COLLECTION};
use crate::server::AppState;
use crate::types::{Error, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Success envelope shared by every JSON endpoint
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error envelope shared by every JSON endpoint
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Serialize a value as a JSON response with permissive CORS headers
pub fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(data)
        .unwrap_or_else(|_| r#"{"error":"internal_error","message":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Success response with a data payload
pub fn data_response<T: Serialize>(status: StatusCode, data: T) -> Response<Full<Bytes>> {
    json_response(
        status,
        &SuccessResponse {
            success: true,
            data: Some(data),
            message: None,
        },
    )
}

/// Success response with a data payload and message
pub fn data_message_response<T: Serialize>(
    status: StatusCode,
    data: T,
    message: &str,
) -> Response<Full<Bytes>> {
    json_response(
        status,
        &SuccessResponse {
            success: true,
            data: Some(data),
            message: Some(message.to_string()),
        },
    )
}

/// Success response with only a message
pub fn message_response(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &SuccessResponse::<()> {
            success: true,
            data: None,
            message: Some(message.to_string()),
        },
    )
}

/// Map a service error onto the HTTP error envelope
pub fn failure_response(err: &Error) -> Response<Full<Bytes>> {
    if err.status() == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", err);
    }
    json_response(
        err.status(),
        &ErrorResponse {
            error: err.code().to_string(),
            message: err.client_message(),
        },
    )
}

/// Authenticate a request: validate the bearer token and load the user.
pub async fn authenticate<B>(req: &Request<B>, state: &Arc<AppState>) -> Result<UserDoc> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| Error::Unauthorized("Missing Authorization header".to_string()))?;

    let token = extract_token_from_header(header)
        .ok_or_else(|| Error::Unauthorized("Invalid Authorization header".to_string()))?;

    let claims = state.jwt.verify(token)?;

    let users = state.mongo.collection::<UserDoc>(USERS_COLLECTION).await?;
    users
        .find_one(bson::doc! { "id": &claims.user_id })
        .await?
        .ok_or_else(|| Error::Unauthorized("User not found".to_string()))
}

/// Get a query parameter from a raw query string
pub fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    let query = query?;
    query.split('&').find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let k = parts.next()?;
        if k == key {
            Some(percent_decode(parts.next().unwrap_or("")))
        } else {
            None
        }
    })
}

/// Minimal percent-decoding for query parameter values
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes.get(i + 1..i + 3).and_then(|h| {
                    std::str::from_utf8(h)
                        .ok()
                        .and_then(|s| u8::from_str_radix(s, 16).ok())
                });
                match hex {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        let q = Some("page=2&limit=50&status=approved");
        assert_eq!(query_param(q, "page").as_deref(), Some("2"));
        assert_eq!(query_param(q, "status").as_deref(), Some("approved"));
        assert_eq!(query_param(q, "missing"), None);
        assert_eq!(query_param(None, "page"), None);
    }

    #[test]
    fn test_query_param_decodes() {
        let q = Some("name=North%20paddy&plus=a+b");
        assert_eq!(query_param(q, "name").as_deref(), Some("North paddy"));
        assert_eq!(query_param(q, "plus").as_deref(), Some("a b"));
    }
}
