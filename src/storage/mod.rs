//! Object storage for media attachments

pub mod client;
pub mod media;

pub use client::StorageClient;
pub use media::MediaKind;
