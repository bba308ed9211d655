//! Promptcraft HTTP API service.
//!
//! This crate provides the HTTP API behind the promptcraft web app:
//!
//! - Password sessions backed by the hosted auth provider
//! - Profiles and the credit ledger
//! - Paid image generation with a gallery in object storage
//! - Stripe checkout and the webhook that turns payments into credits
//!
//! # Authentication
//!
//! Requests authenticate with the provider's access token, sent either as a
//! `Bearer` header or in the session cookie set by `POST /auth/login`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers stay async for a uniform signature

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod images;
pub mod routes;
pub mod state;
pub mod storage;
pub mod stripe;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use identity::AuthClient;
pub use images::ImageClient;
pub use routes::create_router;
pub use state::AppState;
pub use storage::StorageClient;
pub use stripe::{StripeClient, StripeError};
