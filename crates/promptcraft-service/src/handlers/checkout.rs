//! Checkout initiation.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::CheckoutRequest;

/// Checkout request.
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Stripe price id of the pack or plan.
    #[serde(default, alias = "priceId")]
    pub price_id: Option<String>,
}

/// Checkout response.
#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    /// Stripe checkout session ID.
    pub session_id: String,
    /// Hosted checkout URL to redirect the user to.
    pub url: String,
}

/// Start a hosted checkout session for one price.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    let price_id = body
        .price_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("price_id is required".into()))?;

    let tier = state
        .config
        .pricing
        .tier(price_id)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown price: {price_id}")))?;

    let stripe = state.stripe()?;
    let profile = state.store.ensure_profile(&auth.user_id).await?;
    let user_id = auth.user_id.to_string();

    let customer_id = if let Some(id) = profile.stripe_customer_id {
        id
    } else {
        let customer = stripe
            .create_customer(&user_id, auth.email.as_deref())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, user_id = %user_id, "Failed to create Stripe customer");
                ApiError::ExternalService("Failed to create billing customer".into())
            })?;

        // Persist before the session exists so webhooks can resolve the user.
        state
            .store
            .set_stripe_customer_id(&auth.user_id, &customer.id)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    user_id = %user_id,
                    customer_id = %customer.id,
                    "Failed to persist Stripe customer id"
                );
                ApiError::Internal(format!("failed to persist customer id: {e}"))
            })?;

        tracing::info!(user_id = %user_id, customer_id = %customer.id, "Stripe customer created");
        customer.id
    };

    let success_url = format!(
        "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}",
        state.config.base_url
    );
    let cancel_url = format!("{}/payment/cancelled", state.config.base_url);

    let session = stripe
        .create_checkout_session(&CheckoutRequest {
            customer_id: &customer_id,
            user_id: &user_id,
            price_id,
            mode: tier.kind.checkout_mode(),
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, price_id = %price_id, "Failed to create Stripe checkout session");
            ApiError::ExternalService(format!("Failed to create checkout session: {e}"))
        })?;

    let url = session
        .url
        .ok_or_else(|| ApiError::ExternalService("Stripe returned no checkout URL".into()))?;

    tracing::info!(
        user_id = %user_id,
        session_id = %session.id,
        price_id = %price_id,
        "Stripe checkout session created"
    );

    Ok(Json(CreateCheckoutResponse {
        session_id: session.id,
        url,
    }))
}
