//! Public pricing handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use promptcraft_core::PriceTier;

use crate::state::AppState;

/// Pricing response.
#[derive(Debug, Serialize)]
pub struct PricingResponse {
    /// Purchasable tiers, in display order.
    pub tiers: Vec<PriceTier>,
    /// Credits debited per generated image.
    pub generation_cost: i64,
}

/// List the configured prices.
pub async fn get_pricing(State(state): State<Arc<AppState>>) -> Json<PricingResponse> {
    Json(PricingResponse {
        tiers: state.config.pricing.tiers.clone(),
        generation_cost: state.config.generation_cost,
    })
}
