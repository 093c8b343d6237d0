//! Cloud Storage client
//!
//! Uploads media objects over the JSON API and exposes their public URLs.
//! Object names are `{submission_id}/{uuid}_{timestamp}{ext}` so one
//! submission's attachments group under a common prefix.

use std::time::Duration;
use tracing::warn;

use crate::types::{Error, Result};

/// Client for the Cloud Storage JSON API
pub struct StorageClient {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
    access_token: Option<String>,
}

impl StorageClient {
    pub fn new(base_url: String, bucket: String, access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            access_token,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Public URL of an object in the bucket
    pub fn public_url(&self, object: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, object)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.timeout(Duration::from_secs(60));
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Upload an object and make it publicly readable. Returns the public URL.
    pub async fn upload(&self, object: &str, content_type: &str, data: Vec<u8>) -> Result<String> {
        let upload_url = format!("{}/upload/storage/v1/b/{}/o", self.base_url, self.bucket);

        let response = self
            .authorize(self.http.post(&upload_url))
            .query(&[("uploadType", "media"), ("name", object)])
            .header("Content-Type", content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("upload request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Storage(format!("upload failed: {} {}", status, body)));
        }

        // Public-read ACL failure is logged but does not fail the upload
        if let Err(e) = self.make_public(object).await {
            warn!(object = %object, "Failed to make object public: {}", e);
        }

        Ok(self.public_url(object))
    }

    async fn make_public(&self, object: &str) -> Result<()> {
        let acl_url = format!(
            "{}/storage/v1/b/{}/o/{}/acl",
            self.base_url,
            self.bucket,
            encode_object(object)
        );

        let response = self
            .authorize(self.http.post(&acl_url))
            .json(&serde_json::json!({ "entity": "allUsers", "role": "READER" }))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("acl request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Storage(format!("acl set failed: {}", response.status())))
        }
    }

    /// Delete an object from the bucket
    pub async fn delete(&self, object: &str) -> Result<()> {
        let delete_url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            self.bucket,
            encode_object(object)
        );

        let response = self
            .authorize(self.http.delete(&delete_url))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("delete request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Storage(format!("delete failed: {}", response.status())))
        }
    }
}

/// Percent-encode an object name for use as a single JSON-API path segment
/// (slashes in object names must be encoded)
fn encode_object(object: &str) -> String {
    let mut out = String::with_capacity(object.len());
    for c in object.chars() {
        match c {
            '/' => out.push_str("%2F"),
            ' ' => out.push_str("%20"),
            '%' => out.push_str("%25"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url() {
        let client = StorageClient::new(
            "https://storage.googleapis.com".to_string(),
            "ricewatch-media".to_string(),
            None,
        );
        assert_eq!(
            client.public_url("sub-1/abc_20240301.jpg"),
            "https://storage.googleapis.com/ricewatch-media/sub-1/abc_20240301.jpg"
        );
    }

    #[test]
    fn test_encode_object() {
        assert_eq!(encode_object("sub-1/a b.jpg"), "sub-1%2Fa%20b.jpg");
    }
}
