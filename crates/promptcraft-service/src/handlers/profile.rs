//! Profile handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use promptcraft_core::{Profile, ProfileUpdate};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Profile response.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    /// User ID.
    pub user_id: String,
    /// Email address from the session.
    pub email: Option<String>,
    /// Current credit balance.
    pub credits: i64,
    /// Whether a billing customer is linked.
    pub has_billing_account: bool,
    /// Public handle.
    pub username: Option<String>,
    /// Display name.
    pub full_name: Option<String>,
    /// Personal website.
    pub website_url: Option<String>,
    /// Created timestamp (RFC 3339).
    pub created_at: String,
    /// Last update timestamp (RFC 3339).
    pub updated_at: String,
}

impl ProfileResponse {
    fn new(profile: Profile, email: Option<String>) -> Self {
        Self {
            user_id: profile.user_id.to_string(),
            email,
            credits: profile.credits,
            has_billing_account: profile.stripe_customer_id.is_some(),
            username: profile.username,
            full_name: profile.full_name,
            website_url: profile.website_url,
            created_at: profile.created_at.to_rfc3339(),
            updated_at: profile.updated_at.to_rfc3339(),
        }
    }
}

/// Get the current user's profile.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.store.ensure_profile(&auth.user_id).await?;
    Ok(Json(ProfileResponse::new(profile, auth.email)))
}

/// Update the current user's display fields.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let update = body
        .normalized()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if update.is_empty() {
        return Err(ApiError::BadRequest("No profile fields to update".into()));
    }

    state.store.ensure_profile(&auth.user_id).await?;
    let profile = state.store.update_profile(&auth.user_id, &update).await?;

    tracing::info!(user_id = %auth.user_id, "Profile updated");

    Ok(Json(ProfileResponse::new(profile, auth.email)))
}
