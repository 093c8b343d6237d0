//! Spreadsheet mirroring: row codec, values-API client, sync engine and the
//! bounded worker queue that drives it off the request path

pub mod client;
pub mod codec;
pub mod sync;
pub mod worker;

pub use client::{GoogleSheetsClient, SheetsApi};
pub use codec::{encode_row, HEADER};
pub use sync::{MongoRegistrations, RegistrationSource, SheetSyncEngine};
pub use worker::{spawn_sync_workers, SyncJob, SyncQueue};
