//! Object storage for generated images.
//!
//! Objects live at `<user_id>/<image_id>.<ext>` inside one bucket and are only
//! served through short-lived signed URLs.

pub mod client;

pub use client::{StorageClient, StorageError};
