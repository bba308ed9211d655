//! Application state.

use std::sync::Arc;
use std::time::Duration;

use promptcraft_store::Store;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::identity::AuthClient;
use crate::images::ImageClient;
use crate::storage::StorageClient;
use crate::stripe::StripeClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Stripe client for payments (optional).
    pub stripe: Option<Arc<StripeClient>>,

    /// Image generation client (optional).
    pub images: Option<Arc<ImageClient>>,

    /// Object storage client (optional).
    pub storage: Option<Arc<StorageClient>>,

    /// Auth API client (optional).
    pub identity: Option<Arc<AuthClient>>,
}

impl AppState {
    /// Create a new application state, building every configured client.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let stripe = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key) {
                Ok(client) => {
                    tracing::info!("Stripe integration enabled");
                    Some(Arc::new(client.with_base_url(&config.stripe_api_base)))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });
        if stripe.is_none() {
            tracing::warn!("Stripe not configured - checkout will not be available");
        }
        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - webhooks will be refused");
        }

        let images = config.openai_api_key.as_ref().and_then(|key| {
            match ImageClient::new(key) {
                Ok(client) => {
                    tracing::info!(model = %config.image_model, "Image generation enabled");
                    Some(Arc::new(
                        client
                            .with_base_url(&config.openai_base_url)
                            .with_generation_timeout(Duration::from_secs(
                                config.image_generation_timeout_seconds,
                            )),
                    ))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create image client");
                    None
                }
            }
        });
        if images.is_none() {
            tracing::warn!("OpenAI not configured - image generation will not be available");
        }

        let storage = config
            .supabase_url
            .as_ref()
            .zip(config.supabase_service_role_key.as_ref())
            .and_then(|(url, key)| {
                match StorageClient::new(url, key, &config.storage_bucket) {
                    Ok(client) => {
                        tracing::info!(bucket = %config.storage_bucket, "Object storage enabled");
                        Some(Arc::new(client))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create storage client");
                        None
                    }
                }
            });
        if storage.is_none() {
            tracing::warn!("Storage not configured - images cannot be stored or served");
        }

        let identity = config
            .supabase_url
            .as_ref()
            .zip(config.supabase_anon_key.as_ref())
            .and_then(|(url, key)| match AuthClient::new(url, key) {
                Ok(client) => {
                    tracing::info!(auth_url = %url, "Auth integration enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create auth client");
                    None
                }
            });
        if identity.is_none() && config.supabase_jwt_secret.is_none() {
            tracing::warn!("Auth not configured - every request will be unauthenticated");
        }

        Self {
            store,
            config,
            stripe,
            images,
            storage,
            identity,
        }
    }

    /// The Stripe client, or an error if payments are not configured.
    pub fn stripe(&self) -> Result<&StripeClient, ApiError> {
        self.stripe
            .as_deref()
            .ok_or_else(|| ApiError::ExternalService("Payments not configured".into()))
    }

    /// The image client, or an error if generation is not configured.
    pub fn images(&self) -> Result<&ImageClient, ApiError> {
        self.images
            .as_deref()
            .ok_or_else(|| ApiError::ExternalService("Image generation not configured".into()))
    }

    /// The storage client, or an error if storage is not configured.
    pub fn storage(&self) -> Result<&StorageClient, ApiError> {
        self.storage
            .as_deref()
            .ok_or_else(|| ApiError::ExternalService("Storage not configured".into()))
    }

    /// The auth client, or an error if auth is not configured.
    pub fn identity(&self) -> Result<&AuthClient, ApiError> {
        self.identity
            .as_deref()
            .ok_or_else(|| ApiError::ExternalService("Authentication not configured".into()))
    }
}
