//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{checkout, credits, generate, health, images, pricing, profile, session, webhooks};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent generation requests.
/// Each one holds an upstream model call and an upload open.
const GENERATE_MAX_CONCURRENT_REQUESTS: usize = 8;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /api/pricing` - Configured price tiers
///
/// ## Session
/// - `POST /auth/login` - Password sign-in, sets the session cookie
/// - `POST /auth/signup` - Registration
/// - `POST /auth/logout` - Sign-out, clears the session cookie
///
/// ## API (bearer token or session cookie)
/// - `GET /api/session` - Current user and balance
/// - `GET /api/profile` / `PATCH /api/profile` - Profile read and update
/// - `GET /api/images` - Gallery, newest first
/// - `DELETE /api/images/:id` - Delete one image
/// - `GET /api/credits/transactions` - Credit ledger
/// - `POST /api/checkout` - Start a hosted checkout
/// - `POST /api/generate` - Generate an image (own concurrency limit)
///
/// ## Webhooks (signature verification)
/// - `POST /api/webhooks/stripe` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let generate_routes = Router::new()
        .route("/", post(generate::generate_image))
        .layer(ConcurrencyLimitLayer::new(GENERATE_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/session", get(session::current_session))
        .route(
            "/profile",
            get(profile::get_profile).patch(profile::update_profile),
        )
        .route("/images", get(images::list_images))
        .route("/images/:id", delete(images::delete_image))
        .route("/credits/transactions", get(credits::list_transactions))
        .route("/checkout", post(checkout::create_checkout))
        .nest("/generate", generate_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    let auth_routes = Router::new()
        .route("/login", post(session::login))
        .route("/signup", post(session::signup))
        .route("/logout", post(session::logout));

    Router::new()
        // Public, no rate limit
        .route("/health", get(health::health))
        .route("/api/pricing", get(pricing::get_pricing))
        .nest("/auth", auth_routes)
        .nest("/api", api_routes)
        // Webhooks (no rate limit - controlled by Stripe)
        .route("/api/webhooks/stripe", post(webhooks::stripe_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
