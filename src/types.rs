//! Shared error and result types

use hyper::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Service-wide error type.
///
/// CRUD-path errors map onto the HTTP taxonomy via [`Error::status`].
/// Sync-path errors (spreadsheet mirroring) are logged and swallowed by the
/// worker queue and never reach a client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("access denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("spreadsheet error: {0}")]
    Sheets(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "invalid_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden => "forbidden",
            Error::NotFound(_) => "not_found",
            _ => "internal_error",
        }
    }

    /// Message safe to return to a client. Internal detail stays in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Error::Validation(msg) => msg.clone(),
            Error::Unauthorized(msg) => msg.clone(),
            Error::Forbidden => "Access denied".to_string(),
            Error::NotFound(what) => format!("{} not found", capitalize(what)),
            _ => "Internal server error".to_string(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::NotFound("submission").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::Database("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_hidden_from_client() {
        let err = Error::Database("connection refused at 10.0.0.3".into());
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            Error::NotFound("submission").client_message(),
            "Submission not found"
        );
    }
}
