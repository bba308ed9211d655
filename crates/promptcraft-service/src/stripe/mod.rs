//! Stripe integration for payments and customer management.
//!
//! Stripe handles:
//! - Customer registration
//! - Credit pack and subscription purchases via Checkout
//! - Signed webhooks for payment events

pub mod client;
pub mod types;
pub mod webhook;

pub use client::{CheckoutRequest, StripeClient, StripeError};
pub use types::*;
