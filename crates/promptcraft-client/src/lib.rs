//! Promptcraft Client SDK.
//!
//! This crate provides a typed client for the promptcraft HTTP API.
//!
//! # Example
//!
//! ```no_run
//! use promptcraft_client::PromptcraftClient;
//!
//! # async fn example() -> Result<(), promptcraft_client::ClientError> {
//! let mut client = PromptcraftClient::new("http://localhost:8080")?;
//! client.login("ada@example.com", "correct horse").await?;
//!
//! let image = client.generate("a lighthouse at dusk").await?;
//! println!("{} ({} credits left)", image.image_url, image.new_credits);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)] // Every call fails the same ways; see `ClientError`

mod client;
mod error;
mod types;

pub use client::{ClientOptions, PromptcraftClient};
pub use error::ClientError;
pub use types::*;
