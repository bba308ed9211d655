//! Gallery handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use promptcraft_core::{ImageId, ImageRecord};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

const MAX_LIMIT: usize = 100;

/// Image list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListImagesQuery {
    /// Maximum number of images to return (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// A gallery entry.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    /// Image ID.
    pub id: String,
    /// Prompt that produced the image.
    pub prompt: String,
    /// Image model.
    pub model: String,
    /// Credits spent.
    pub cost: i64,
    /// Short-lived URL, absent if signing failed.
    pub image_url: Option<String>,
    /// Created timestamp (RFC 3339).
    pub created_at: String,
}

/// List images response.
#[derive(Debug, Serialize)]
pub struct ListImagesResponse {
    /// Images (newest first).
    pub images: Vec<ImageResponse>,
    /// Whether there are more images.
    pub has_more: bool,
}

async fn to_response(state: &AppState, image: ImageRecord) -> ImageResponse {
    let image_url = match state.storage() {
        Ok(storage) => storage
            .create_signed_url(&image.storage_path, state.config.signed_url_ttl_seconds)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, image_id = %image.id, "Failed to sign image URL");
            })
            .ok(),
        Err(_) => None,
    };

    ImageResponse {
        id: image.id.to_string(),
        prompt: image.prompt,
        model: image.model,
        cost: image.cost,
        image_url,
        created_at: image.created_at.to_rfc3339(),
    }
}

/// List the current user's images.
pub async fn list_images(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListImagesQuery>,
) -> Result<Json<ListImagesResponse>, ApiError> {
    // Fetch one more than requested to determine has_more
    let limit = query.limit.clamp(1, MAX_LIMIT);
    let mut records = state
        .store
        .list_images(&auth.user_id, limit + 1, query.offset)
        .await?;

    let has_more = records.len() > limit;
    records.truncate(limit);

    let mut images = Vec::with_capacity(records.len());
    for record in records {
        images.push(to_response(&state, record).await);
    }

    Ok(Json(ListImagesResponse { images, has_more }))
}

/// Delete one of the current user's images.
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(image_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let image_id: ImageId = image_id
        .parse()
        .map_err(|_| ApiError::NotFound(format!("image not found: {image_id}")))?;

    let removed = state.store.delete_image(&auth.user_id, &image_id).await?;

    match state.storage() {
        Ok(storage) => {
            if let Err(e) = storage.remove(&removed.storage_path).await {
                tracing::warn!(
                    error = %e,
                    path = %removed.storage_path,
                    "Failed to remove image object"
                );
            }
        }
        Err(_) => tracing::warn!(path = %removed.storage_path, "Storage not configured; object left behind"),
    }

    tracing::info!(user_id = %auth.user_id, image_id = %image_id, "Image deleted");

    Ok(StatusCode::NO_CONTENT)
}
