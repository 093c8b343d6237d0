//! Configuration for ricewatch
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

/// ricewatch - field observation backend for rice crop monitoring
#[derive(Parser, Debug, Clone)]
#[command(name = "ricewatch")]
#[command(about = "Field observation backend with spreadsheet mirroring")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "ricewatch")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Access token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Refresh token expiry in seconds
    #[arg(long, env = "JWT_REFRESH_EXPIRY_SECONDS", default_value = "604800")]
    pub jwt_refresh_expiry_seconds: u64,

    /// Google API key passed to the OAuth tokeninfo endpoint
    #[arg(long, env = "GOOGLE_API_KEY")]
    pub google_api_key: Option<String>,

    /// OAuth bearer token for Sheets and Cloud Storage API calls
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN")]
    pub google_access_token: Option<String>,

    /// Base URL of the Google Sheets values API
    #[arg(
        long,
        env = "SHEETS_API_URL",
        default_value = "https://sheets.googleapis.com/v4/spreadsheets"
    )]
    pub sheets_api_url: String,

    /// Base URL of the Cloud Storage API
    #[arg(long, env = "STORAGE_API_URL", default_value = "https://storage.googleapis.com")]
    pub storage_api_url: String,

    /// Cloud Storage bucket for media uploads
    #[arg(long, env = "STORAGE_BUCKET", default_value = "ricewatch-media")]
    pub storage_bucket: String,

    /// Number of spreadsheet sync worker tasks
    #[arg(long, env = "SYNC_WORKER_COUNT", default_value = "4")]
    pub sync_worker_count: usize,

    /// Maximum queued spreadsheet sync jobs
    #[arg(long, env = "SYNC_QUEUE_SIZE", default_value = "256")]
    pub sync_queue_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Enable development mode (insecure default JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.sync_worker_count == 0 {
            return Err("SYNC_WORKER_COUNT must be at least 1".to_string());
        }

        if self.sync_queue_size == 0 {
            return Err("SYNC_QUEUE_SIZE must be at least 1".to_string());
        }

        Ok(())
    }
}
