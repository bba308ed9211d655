//! API handlers.

pub mod checkout;
pub mod credits;
pub mod generate;
pub mod health;
pub mod images;
pub mod pricing;
pub mod profile;
pub mod session;
pub mod webhooks;
