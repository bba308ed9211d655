//! Core types for promptcraft.
//!
//! This crate provides the foundational types shared by the store, the HTTP
//! service and the client SDK:
//!
//! - **Identifiers**: `UserId`, `ImageId`, `TransactionId`
//! - **Profiles**: `Profile`, `ProfileUpdate`
//! - **Images**: `ImageRecord`, `NewImage`
//! - **Credits**: `CreditTransaction`, `CreditGrant`, `GrantOutcome`
//! - **Pricing**: `PricingCatalog`, `PriceTier`, `PriceKind`
//!
//! # Credits
//!
//! Credits are whole units stored as `i64`. One image generation costs
//! [`DEFAULT_GENERATION_COST`] credits unless configured otherwise; payments
//! grant the number of credits mapped to the purchased price.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod credits;
pub mod error;
pub mod ids;
pub mod image;
pub mod pricing;
pub mod profile;

pub use credits::{CreditGrant, CreditTransaction, GrantOutcome, TransactionKind};
pub use error::{CoreError, Result};
pub use ids::{IdError, ImageId, TransactionId, UserId};
pub use image::{ImageRecord, NewImage};
pub use pricing::{PriceKind, PriceTier, PricingCatalog, DEFAULT_GENERATION_COST};
pub use profile::{Profile, ProfileUpdate};
