//! Google Sheets values API client
//!
//! The sync engine talks to the spreadsheet backend through [`SheetsApi`] so
//! it can be exercised against an in-memory double; [`GoogleSheetsClient`] is
//! the production implementation speaking the values REST API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::types::{Error, Result};

/// Range read/update/append operations against a spreadsheet backend
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Read a range as rows of cell strings. A blank range yields no rows.
    async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>>;

    /// Overwrite cells starting at the given range
    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<()>;

    /// Append a row after the last row of the table at the given range
    async fn append_row(&self, spreadsheet_id: &str, range: &str, row: Vec<String>) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Option<Vec<Vec<serde_json::Value>>>,
}

/// Client for the Google Sheets values API
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl GoogleSheetsClient {
    pub fn new(base_url: String, access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            access_token,
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str, suffix: &str) -> String {
        format!(
            "{}/{}/values/{}{}",
            self.base_url.trim_end_matches('/'),
            spreadsheet_id,
            encode_range(range),
            suffix
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.timeout(Duration::from_secs(30));
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(&self, response: reqwest::Response, op: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::Sheets(format!("{} failed: {} {}", op, status, body)))
        }
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(spreadsheet_id, range, "");
        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| Error::Sheets(format!("read request failed: {}", e)))?;
        let response = self.check(response, "read").await?;

        let parsed: ValuesResponse = response
            .json()
            .await
            .map_err(|e| Error::Sheets(format!("read response parse failed: {}", e)))?;

        Ok(parsed
            .values
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<()> {
        let url = self.values_url(spreadsheet_id, range, "?valueInputOption=RAW");
        let response = self
            .authorize(self.http.put(&url))
            .json(&json!({ "values": rows }))
            .send()
            .await
            .map_err(|e| Error::Sheets(format!("update request failed: {}", e)))?;
        self.check(response, "update").await?;
        Ok(())
    }

    async fn append_row(&self, spreadsheet_id: &str, range: &str, row: Vec<String>) -> Result<()> {
        let url = self.values_url(spreadsheet_id, range, ":append?valueInputOption=RAW");
        let response = self
            .authorize(self.http.post(&url))
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .map_err(|e| Error::Sheets(format!("append request failed: {}", e)))?;
        self.check(response, "append").await?;
        Ok(())
    }
}

fn cell_to_string(cell: serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Percent-encode the characters an A1 range can contain that are unsafe in
/// a URL path segment (quotes, spaces, the sheet separator).
fn encode_range(range: &str) -> String {
    let mut out = String::with_capacity(range.len());
    for c in range.chars() {
        match c {
            ' ' => out.push_str("%20"),
            '\'' => out.push_str("%27"),
            '!' => out.push_str("%21"),
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
    fn test_encode_range() {
        assert_eq!(encode_range("'Field Log'!A1:A1"), "%27Field%20Log%27%21A1:A1");
        assert_eq!(encode_range("A:A"), "A:A");
    }

    #[test]
    fn test_cell_to_string_handles_numbers() {
        assert_eq!(cell_to_string(serde_json::json!("abc")), "abc");
        assert_eq!(cell_to_string(serde_json::json!(42)), "42");
    }
}
