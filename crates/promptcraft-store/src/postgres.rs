//! PostgreSQL storage implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use promptcraft_core::{
    CreditGrant, CreditTransaction, GrantOutcome, ImageId, ImageRecord, NewImage, Profile,
    ProfileUpdate, TransactionKind, UserId,
};

use crate::error::{Result, StoreError};
use crate::Store;

const MAX_CONNECTIONS: u32 = 10;

const PROFILE_COLUMNS: &str =
    "user_id, credits, stripe_customer_id, username, full_name, website_url, created_at, updated_at";

const IMAGE_COLUMNS: &str = "id, user_id, storage_path, prompt, model, cost, created_at";

/// PostgreSQL-backed `Store`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn balance_of(tx: &mut Transaction<'_, Postgres>, user_id: &UserId) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT credits FROM profiles WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "profile",
                id: user_id.to_string(),
            })
    }

    async fn insert_transaction(
        tx: &mut Transaction<'_, Postgres>,
        entry: &CreditTransaction,
    ) -> Result<u64> {
        let result = sqlx::query(
            "INSERT INTO credit_transactions \
             (id, user_id, amount, kind, balance_after, description, source_event_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (source_event_id) DO NOTHING",
        )
        .bind(entry.id.to_string())
        .bind(entry.user_id.as_uuid())
        .bind(entry.amount)
        .bind(entry.kind.as_str())
        .bind(entry.balance_after)
        .bind(&entry.description)
        .bind(entry.source_event_id.as_deref())
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    credits: i64,
    stripe_customer_id: Option<String>,
    username: Option<String>,
    full_name: Option<String>,
    website_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            user_id: UserId::from_uuid(row.user_id),
            credits: row.credits,
            stripe_customer_id: row.stripe_customer_id,
            username: row.username,
            full_name: row.full_name,
            website_url: row.website_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: String,
    user_id: Uuid,
    storage_path: String,
    prompt: String,
    model: String,
    cost: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<ImageRow> for ImageRecord {
    type Error = StoreError;

    fn try_from(row: ImageRow) -> Result<Self> {
        Ok(Self {
            id: row
                .id
                .parse()
                .map_err(|e: promptcraft_core::IdError| StoreError::Serialization(e.to_string()))?,
            user_id: UserId::from_uuid(row.user_id),
            storage_path: row.storage_path,
            prompt: row.prompt,
            model: row.model,
            cost: row.cost,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: String,
    user_id: Uuid,
    amount: i64,
    kind: String,
    balance_after: i64,
    description: String,
    source_event_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for CreditTransaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        let kind = TransactionKind::parse(&row.kind).ok_or_else(|| {
            StoreError::Serialization(format!("unknown transaction kind: {}", row.kind))
        })?;
        Ok(Self {
            id: row
                .id
                .parse()
                .map_err(|e: promptcraft_core::IdError| StoreError::Serialization(e.to_string()))?,
            user_id: UserId::from_uuid(row.user_id),
            amount: row.amount,
            kind,
            balance_after: row.balance_after,
            description: row.description,
            source_event_id: row.source_event_id,
            created_at: row.created_at,
        })
    }
}

fn page_bounds(limit: usize, offset: usize) -> (i64, i64) {
    (
        i64::try_from(limit).unwrap_or(i64::MAX),
        i64::try_from(offset).unwrap_or(i64::MAX),
    )
}

#[async_trait]
impl Store for PgStore {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Profile::from))
    }

    async fn ensure_profile(&self, user_id: &UserId) -> Result<Profile> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "INSERT INTO profiles (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_profile(&self, user_id: &UserId, update: &ProfileUpdate) -> Result<Profile> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "UPDATE profiles SET \
               username = NULLIF(COALESCE($2, username), ''), \
               full_name = NULLIF(COALESCE($3, full_name), ''), \
               website_url = NULLIF(COALESCE($4, website_url), ''), \
               updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id.as_uuid())
        .bind(update.username.as_deref())
        .bind(update.full_name.as_deref())
        .bind(update.website_url.as_deref())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            entity: "profile",
            id: user_id.to_string(),
        })?;
        Ok(row.into())
    }

    async fn set_stripe_customer_id(&self, user_id: &UserId, customer_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE profiles SET stripe_customer_id = $2, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .bind(customer_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "profile",
                id: user_id.to_string(),
            });
        }
        Ok(())
    }

    async fn find_profile_by_stripe_customer(&self, customer_id: &str) -> Result<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE stripe_customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Profile::from))
    }

    async fn grant_credits(&self, grant: &CreditGrant) -> Result<GrantOutcome> {
        if grant.credits < 1 {
            return Err(StoreError::InvalidAmount(grant.credits));
        }
        let mut tx = self.pool.begin().await?;

        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE profiles SET credits = credits + $2, updated_at = NOW() \
             WHERE user_id = $1 RETURNING credits",
        )
        .bind(grant.user_id.as_uuid())
        .bind(grant.credits)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            entity: "profile",
            id: grant.user_id.to_string(),
        })?;

        let entry = CreditTransaction::from_grant(grant, balance);
        if Self::insert_transaction(&mut tx, &entry).await? == 0 {
            tx.rollback().await?;
            debug!(event_id = %grant.event_id, "Grant already applied");
            return Ok(GrantOutcome::Duplicate);
        }

        tx.commit().await?;
        Ok(GrantOutcome::Applied { balance })
    }

    async fn process_image_generation(&self, image: &NewImage) -> Result<i64> {
        if image.cost < 1 {
            return Err(StoreError::InvalidAmount(image.cost));
        }
        let mut tx = self.pool.begin().await?;

        let debited = sqlx::query_scalar::<_, i64>(
            "UPDATE profiles SET credits = credits - $2, updated_at = NOW() \
             WHERE user_id = $1 AND credits >= $2 RETURNING credits",
        )
        .bind(image.user_id.as_uuid())
        .bind(image.cost)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(balance) = debited else {
            let balance = Self::balance_of(&mut tx, &image.user_id).await?;
            return Err(StoreError::InsufficientCredits {
                balance,
                required: image.cost,
            });
        };

        sqlx::query(
            "INSERT INTO generated_images (id, user_id, storage_path, prompt, model, cost) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(image.id.to_string())
        .bind(image.user_id.as_uuid())
        .bind(&image.storage_path)
        .bind(&image.prompt)
        .bind(&image.model)
        .bind(image.cost)
        .execute(&mut *tx)
        .await?;

        let entry = CreditTransaction::generation(image.user_id, &image.id, image.cost, balance);
        Self::insert_transaction(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(balance)
    }

    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let (limit, offset) = page_bounds(limit, offset);
        sqlx::query_as::<_, TransactionRow>(
            "SELECT id, user_id, amount, kind, balance_after, description, source_event_id, created_at \
             FROM credit_transactions WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id.as_uuid())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CreditTransaction::try_from)
        .collect()
    }

    async fn list_images(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ImageRecord>> {
        let (limit, offset) = page_bounds(limit, offset);
        sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM generated_images WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id.as_uuid())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ImageRecord::try_from)
        .collect()
    }

    async fn get_image(&self, user_id: &UserId, image_id: &ImageId) -> Result<Option<ImageRecord>> {
        sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM generated_images WHERE id = $1 AND user_id = $2"
        ))
        .bind(image_id.to_string())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(ImageRecord::try_from)
        .transpose()
    }

    async fn delete_image(&self, user_id: &UserId, image_id: &ImageId) -> Result<ImageRecord> {
        sqlx::query_as::<_, ImageRow>(&format!(
            "DELETE FROM generated_images WHERE id = $1 AND user_id = $2 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(image_id.to_string())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            entity: "image",
            id: image_id.to_string(),
        })?
        .try_into()
    }
}
