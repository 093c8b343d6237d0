//! Google OAuth access-token verification
//!
//! Calls Google's tokeninfo endpoint to validate a client-supplied access
//! token and learn the account email. Token issuance to the client happens
//! entirely on Google's side; this service only verifies.

use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::types::{Error, Result};

const DEFAULT_TOKENINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/tokeninfo";

/// Subset of the tokeninfo response this service consumes
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTokenInfo {
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
}

/// Verifier for Google OAuth access tokens
#[derive(Clone)]
pub struct GoogleVerifier {
    http: reqwest::Client,
    tokeninfo_url: String,
    api_key: Option<String>,
}

impl GoogleVerifier {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_url(DEFAULT_TOKENINFO_URL.to_string(), api_key)
    }

    pub fn with_url(tokeninfo_url: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokeninfo_url,
            api_key,
        }
    }

    /// Verify an access token and return the associated account info
    pub async fn verify(&self, access_token: &str) -> Result<GoogleTokenInfo> {
        let mut request = self
            .http
            .get(&self.tokeninfo_url)
            .query(&[("access_token", access_token)])
            .timeout(Duration::from_secs(10));

        if let Some(ref key) = self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Internal(format!("tokeninfo request failed: {}", e)))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Google rejected access token");
            return Err(Error::Unauthorized("Invalid Google token".to_string()));
        }

        response
            .json::<GoogleTokenInfo>()
            .await
            .map_err(|e| Error::Internal(format!("tokeninfo response parse failed: {}", e)))
    }
}
