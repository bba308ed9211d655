//! Stripe webhook handler.
//!
//! Every verified delivery is acknowledged with 200, including events that are
//! ignored or whose processing failed; failures are logged instead of being
//! surfaced to Stripe as retries. Grants are keyed by event id, so a redelivered
//! event never adds credits twice.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use promptcraft_core::{CreditGrant, GrantOutcome, TransactionKind, UserId};
use promptcraft_store::StoreError;

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::webhook::construct_event;
use crate::stripe::{CheckoutSession, Invoice, StripeError, WebhookEvent};

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was received.
    pub received: bool,
}

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::Internal("Stripe webhook secret not configured".into()))?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

    let event = construct_event(
        &body,
        signature,
        secret,
        state.config.stripe_webhook_tolerance_seconds,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Rejected Stripe webhook");
        match e {
            StripeError::Serialization(_) => ApiError::BadRequest("Malformed event payload".into()),
            _ => ApiError::BadRequest("Invalid webhook signature".into()),
        }
    })?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    let result = match event.event_type.as_str() {
        "checkout.session.completed" => handle_checkout_completed(&state, &event).await,
        "invoice.payment_succeeded" => handle_invoice_paid(&state, &event).await,
        _ => {
            tracing::debug!(event_type = %event.event_type, "Unhandled Stripe event");
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!(
            error = %e,
            event_id = %event.id,
            event_type = %event.event_type,
            "Failed to process Stripe webhook"
        );
    }

    Ok(Json(WebhookResponse { received: true }))
}

async fn handle_checkout_completed(state: &AppState, event: &WebhookEvent) -> Result<(), StoreError> {
    let session: CheckoutSession = match serde_json::from_value(event.data.object.clone()) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, event_id = %event.id, "Unreadable checkout session");
            return Ok(());
        }
    };

    let Some(user_id) = session
        .metadata
        .get("user_id")
        .and_then(|raw| raw.parse::<UserId>().ok())
    else {
        tracing::warn!(session_id = %session.id, "Checkout session without a valid user_id");
        return Ok(());
    };

    if !session.is_paid() {
        tracing::info!(
            session_id = %session.id,
            payment_status = ?session.payment_status,
            "Checkout session not paid; skipping"
        );
        return Ok(());
    }

    let price_id = session.metadata.get("price_id").map(String::as_str);
    let Some((price_id, credits)) =
        price_id.and_then(|id| state.config.pricing.one_time_credits(id).map(|c| (id, c)))
    else {
        tracing::info!(
            session_id = %session.id,
            price_id = ?price_id,
            "Not a one-time pack; awaiting invoice"
        );
        return Ok(());
    };

    let grant = CreditGrant {
        event_id: event.id.clone(),
        event_type: event.event_type.clone(),
        user_id,
        credits,
        kind: TransactionKind::Purchase,
        description: format!("Credit pack purchase ({price_id})"),
    };
    apply_grant(state, &grant).await
}

async fn handle_invoice_paid(state: &AppState, event: &WebhookEvent) -> Result<(), StoreError> {
    let invoice: Invoice = match serde_json::from_value(event.data.object.clone()) {
        Ok(invoice) => invoice,
        Err(e) => {
            tracing::warn!(error = %e, event_id = %event.id, "Unreadable invoice");
            return Ok(());
        }
    };

    if !invoice.is_subscription() {
        tracing::debug!(
            invoice_id = %invoice.id,
            billing_reason = ?invoice.billing_reason,
            "Invoice not produced by a subscription; skipping"
        );
        return Ok(());
    }

    let (Some(customer_id), Some(price_id)) = (invoice.customer.as_deref(), invoice.first_price_id())
    else {
        tracing::warn!(invoice_id = %invoice.id, "Invoice missing customer or price");
        return Ok(());
    };

    let Some(credits) = state.config.pricing.subscription_credits(price_id) else {
        tracing::warn!(invoice_id = %invoice.id, price_id = %price_id, "Unknown subscription price");
        return Ok(());
    };

    let Some(profile) = state.store.find_profile_by_stripe_customer(customer_id).await? else {
        tracing::warn!(customer_id = %customer_id, "No profile linked to Stripe customer");
        return Ok(());
    };

    let grant = CreditGrant {
        event_id: event.id.clone(),
        event_type: event.event_type.clone(),
        user_id: profile.user_id,
        credits,
        kind: TransactionKind::SubscriptionGrant,
        description: format!("Subscription credits ({price_id})"),
    };
    apply_grant(state, &grant).await
}

async fn apply_grant(state: &AppState, grant: &CreditGrant) -> Result<(), StoreError> {
    // Webhooks can precede the first session for the user.
    state.store.ensure_profile(&grant.user_id).await?;

    match state.store.grant_credits(grant).await? {
        GrantOutcome::Applied { balance } => tracing::info!(
            user_id = %grant.user_id,
            event_id = %grant.event_id,
            credits = grant.credits,
            balance = balance,
            "Credits granted"
        ),
        GrantOutcome::Duplicate => tracing::info!(
            user_id = %grant.user_id,
            event_id = %grant.event_id,
            "Event already applied; no credits granted"
        ),
    }
    Ok(())
}
