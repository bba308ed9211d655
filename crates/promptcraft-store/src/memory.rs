//! In-memory storage implementation.
//!
//! All state sits behind one mutex, so every trait operation is a single
//! critical section and the compound operations are atomic. Images and ledger
//! entries are kept in insertion order, which is also their creation order.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use promptcraft_core::{
    CreditGrant, CreditTransaction, GrantOutcome, ImageId, ImageRecord, NewImage, Profile,
    ProfileUpdate, UserId,
};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct Inner {
    profiles: HashMap<UserId, Profile>,
    images: Vec<ImageRecord>,
    transactions: Vec<CreditTransaction>,
    applied_events: HashSet<String>,
}

/// In-memory `Store`, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    /// Overwrite a user's balance, creating the profile if needed.
    ///
    /// Bypasses the ledger; meant for seeding fixtures.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn set_credits(&self, user_id: &UserId, credits: i64) -> Result<()> {
        let mut inner = self.lock()?;
        inner
            .profiles
            .entry(*user_id)
            .or_insert_with(|| Profile::new(*user_id))
            .credits = credits;
        Ok(())
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: usize, offset: usize) -> Vec<T> {
    items.skip(offset).take(limit).collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        Ok(self.lock()?.profiles.get(user_id).cloned())
    }

    async fn ensure_profile(&self, user_id: &UserId) -> Result<Profile> {
        let mut inner = self.lock()?;
        Ok(inner
            .profiles
            .entry(*user_id)
            .or_insert_with(|| Profile::new(*user_id))
            .clone())
    }

    async fn update_profile(&self, user_id: &UserId, update: &ProfileUpdate) -> Result<Profile> {
        let mut inner = self.lock()?;

        if let Some(username) = update.new_username() {
            let taken = inner
                .profiles
                .values()
                .any(|p| p.user_id != *user_id && p.username.as_deref() == Some(username));
            if taken {
                return Err(StoreError::Conflict(format!(
                    "username already taken: {username}"
                )));
            }
        }

        let profile = inner
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| not_found("profile", user_id))?;
        profile.apply(update);
        Ok(profile.clone())
    }

    async fn set_stripe_customer_id(&self, user_id: &UserId, customer_id: &str) -> Result<()> {
        let mut inner = self.lock()?;
        let profile = inner
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| not_found("profile", user_id))?;
        profile.stripe_customer_id = Some(customer_id.to_string());
        profile.updated_at = Utc::now();
        Ok(())
    }

    async fn find_profile_by_stripe_customer(&self, customer_id: &str) -> Result<Option<Profile>> {
        Ok(self
            .lock()?
            .profiles
            .values()
            .find(|p| p.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn grant_credits(&self, grant: &CreditGrant) -> Result<GrantOutcome> {
        if grant.credits < 1 {
            return Err(StoreError::InvalidAmount(grant.credits));
        }
        let mut inner = self.lock()?;

        if inner.applied_events.contains(&grant.event_id) {
            return Ok(GrantOutcome::Duplicate);
        }

        let profile = inner
            .profiles
            .get_mut(&grant.user_id)
            .ok_or_else(|| not_found("profile", grant.user_id))?;
        profile.credits += grant.credits;
        profile.updated_at = Utc::now();
        let balance = profile.credits;

        let tx = CreditTransaction::from_grant(grant, balance);
        inner.transactions.push(tx);
        inner.applied_events.insert(grant.event_id.clone());

        Ok(GrantOutcome::Applied { balance })
    }

    async fn process_image_generation(&self, image: &NewImage) -> Result<i64> {
        if image.cost < 1 {
            return Err(StoreError::InvalidAmount(image.cost));
        }
        let mut inner = self.lock()?;

        let profile = inner
            .profiles
            .get_mut(&image.user_id)
            .ok_or_else(|| not_found("profile", image.user_id))?;
        if !profile.can_afford(image.cost) {
            return Err(StoreError::InsufficientCredits {
                balance: profile.credits,
                required: image.cost,
            });
        }
        profile.credits -= image.cost;
        profile.updated_at = Utc::now();
        let balance = profile.credits;

        let tx = CreditTransaction::generation(image.user_id, &image.id, image.cost, balance);
        inner.transactions.push(tx);
        inner.images.push(image.clone().into_record());

        Ok(balance)
    }

    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let inner = self.lock()?;
        Ok(page(
            inner
                .transactions
                .iter()
                .rev()
                .filter(|tx| tx.user_id == *user_id)
                .cloned(),
            limit,
            offset,
        ))
    }

    async fn list_images(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ImageRecord>> {
        let inner = self.lock()?;
        Ok(page(
            inner
                .images
                .iter()
                .rev()
                .filter(|img| img.user_id == *user_id)
                .cloned(),
            limit,
            offset,
        ))
    }

    async fn get_image(&self, user_id: &UserId, image_id: &ImageId) -> Result<Option<ImageRecord>> {
        Ok(self
            .lock()?
            .images
            .iter()
            .find(|img| img.id == *image_id && img.user_id == *user_id)
            .cloned())
    }

    async fn delete_image(&self, user_id: &UserId, image_id: &ImageId) -> Result<ImageRecord> {
        let mut inner = self.lock()?;
        let position = inner
            .images
            .iter()
            .position(|img| img.id == *image_id && img.user_id == *user_id)
            .ok_or_else(|| not_found("image", image_id))?;
        Ok(inner.images.remove(position))
    }
}
