//! Storage layer for promptcraft.
//!
//! This crate persists profiles, generated image records and the credit ledger.
//! Two backends implement the [`Store`] trait:
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`, the production backend
//! - [`MemoryStore`]: a mutex-guarded in-memory backend for development and tests
//!
//! # Atomicity
//!
//! Balance changes never happen as read-modify-write in the caller. The two
//! mutating operations, [`Store::grant_credits`] and
//! [`Store::process_image_generation`], each run as one atomic unit inside the
//! backend and return the resulting balance.
//!
//! # Example
//!
//! ```no_run
//! use promptcraft_core::UserId;
//! use promptcraft_store::{MemoryStore, Store};
//!
//! # async fn example() -> promptcraft_store::Result<()> {
//! let store = MemoryStore::new();
//! let user_id = UserId::generate();
//! let profile = store.ensure_profile(&user_id).await?;
//! assert_eq!(profile.credits, 0);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use promptcraft_core::{
    CreditGrant, CreditTransaction, GrantOutcome, ImageId, ImageRecord, NewImage, Profile,
    ProfileUpdate, UserId,
};

/// The storage trait defining all database operations.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Profile Operations
    // =========================================================================

    /// Get a profile by user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>>;

    /// Get the profile for a user, creating an empty one if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn ensure_profile(&self, user_id: &UserId) -> Result<Profile>;

    /// Update the display fields of a profile.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the profile doesn't exist.
    async fn update_profile(&self, user_id: &UserId, update: &ProfileUpdate) -> Result<Profile>;

    /// Link a payment provider customer id to a profile.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the profile doesn't exist.
    async fn set_stripe_customer_id(&self, user_id: &UserId, customer_id: &str) -> Result<()>;

    /// Find the profile linked to a payment provider customer id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_profile_by_stripe_customer(&self, customer_id: &str) -> Result<Option<Profile>>;

    // =========================================================================
    // Credit Operations
    // =========================================================================

    /// Add the grant's credits and record the ledger entry atomically.
    ///
    /// A grant whose event id was already applied returns
    /// `GrantOutcome::Duplicate` and leaves the balance untouched.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the recipient has no profile.
    /// - `StoreError::InvalidAmount` if the grant is not positive.
    async fn grant_credits(&self, grant: &CreditGrant) -> Result<GrantOutcome>;

    /// Debit the generation cost, insert the image record and the ledger entry
    /// atomically. Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the profile doesn't exist.
    /// - `StoreError::InsufficientCredits` if the balance is below the cost.
    /// - `StoreError::InvalidAmount` if the cost is not positive.
    async fn process_image_generation(&self, image: &NewImage) -> Result<i64>;

    /// List ledger entries for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    // =========================================================================
    // Image Operations
    // =========================================================================

    /// List a user's images, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_images(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ImageRecord>>;

    /// Get one of a user's images.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_image(&self, user_id: &UserId, image_id: &ImageId) -> Result<Option<ImageRecord>>;

    /// Delete one of a user's images and return the removed record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user has no such image.
    async fn delete_image(&self, user_id: &UserId, image_id: &ImageId) -> Result<ImageRecord>;
}
