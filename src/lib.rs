//! ricewatch - field observation backend for rice crop monitoring
//!
//! CRUD endpoints over a MongoDB record store, media delegated to object
//! storage, and every submission mirrored into registered Google
//! Spreadsheets for offline reporting.
//!
//! ## Components
//!
//! - **db**: typed collection wrapper over MongoDB
//! - **sheets**: row codec, values-API client, sync engine and worker queue
//! - **storage**: Cloud Storage client for media attachments
//! - **auth**: Google token verification, JWT issue/validate, roles
//! - **server/routes**: hyper http1 server and the API surface

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod sheets;
pub mod storage;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Error, Result};
