//! Image generation.
//!
//! The balance is checked before any paid work happens. The debit itself is
//! one atomic store operation that also records the image, run after the
//! upload; if it fails the uploaded object is removed again.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use promptcraft_core::image::{extension_for_content_type, storage_path};
use promptcraft_core::{ImageId, NewImage};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::StorageClient;

/// Generation request.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Text prompt.
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Generation response.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// Signed URL of the stored image.
    pub image_url: String,
    /// Balance after the debit.
    pub new_credits: i64,
    /// ID of the new image record.
    pub image_id: String,
}

/// Generate an image for the current user.
pub async fn generate_image(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let prompt = body
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("prompt is required".into()))?;

    let cost = state.config.generation_cost;
    if cost < 1 {
        tracing::error!(cost = cost, "Generation cost must be positive");
        return Err(ApiError::Internal("Generation cost misconfigured".into()));
    }
    let profile = state.store.ensure_profile(&auth.user_id).await?;
    if !profile.can_afford(cost) {
        tracing::info!(user_id = %auth.user_id, balance = profile.credits, "Generation refused: insufficient credits");
        return Err(ApiError::InsufficientCredits {
            balance: profile.credits,
            required: cost,
        });
    }

    let images = state.images()?;
    let storage = state.storage()?;

    let temp_url = images
        .generate(prompt, &state.config.image_model, &state.config.image_size)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %auth.user_id, "Image generation failed");
            ApiError::ExternalService(format!("Image generation failed: {e}"))
        })?;

    let downloaded = images.download(&temp_url).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to download generated image");
        ApiError::ExternalService("Failed to download generated image".into())
    })?;

    let image_id = ImageId::generate();
    let ext = extension_for_content_type(downloaded.content_type.as_deref());
    let path = storage_path(&auth.user_id, &image_id, ext);
    let content_type = downloaded
        .content_type
        .clone()
        .unwrap_or_else(|| format!("image/{ext}"));

    storage
        .upload(&path, downloaded.bytes, &content_type)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, path = %path, bucket = %storage.bucket(), "Image upload failed");
            ApiError::ExternalService("Failed to store generated image".into())
        })?;

    let record = NewImage {
        id: image_id,
        user_id: auth.user_id,
        storage_path: path.clone(),
        prompt: prompt.to_string(),
        model: state.config.image_model.clone(),
        cost,
    };

    let new_credits = match state.store.process_image_generation(&record).await {
        Ok(balance) => balance,
        Err(e) => {
            tracing::error!(error = %e, user_id = %auth.user_id, path = %path, "Failed to record generation");
            remove_orphan(storage, &path).await;
            return Err(e.into());
        }
    };

    let image_url = storage
        .create_signed_url(&path, state.config.signed_url_ttl_seconds)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, path = %path, "Failed to sign image URL");
            ApiError::ExternalService("Failed to create image URL".into())
        })?;

    tracing::info!(
        user_id = %auth.user_id,
        image_id = %image_id,
        new_credits = new_credits,
        "Image generated"
    );

    Ok(Json(GenerateResponse {
        image_url,
        new_credits,
        image_id: image_id.to_string(),
    }))
}

/// Best-effort removal of an object whose record could not be written.
async fn remove_orphan(storage: &StorageClient, path: &str) {
    match storage.remove(path).await {
        Ok(()) => tracing::info!(path = %path, "Removed orphaned image object"),
        Err(e) => tracing::error!(error = %e, path = %path, "Failed to remove orphaned image object"),
    }
}
