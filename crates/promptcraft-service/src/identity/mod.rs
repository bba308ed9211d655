//! Identity provider integration (Supabase Auth).
//!
//! Used for password sign-in, sign-up and sign-out, and to resolve access
//! tokens when no JWT secret is configured for local validation.

pub mod client;
pub mod types;

pub use client::{AuthClient, IdentityError};
pub use types::{Session, SignUpOutcome, User};
