//! Request and response types for the promptcraft client.

use serde::{Deserialize, Serialize};

pub use promptcraft_core::{PriceKind, PriceTier, ProfileUpdate};

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
}

/// Configured prices.
#[derive(Debug, Clone, Deserialize)]
pub struct PricingResponse {
    /// Purchasable tiers.
    pub tiers: Vec<PriceTier>,
    /// Credits debited per generated image.
    pub generation_cost: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct CredentialsRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// The signed-in user.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    /// User ID.
    pub user_id: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Current credit balance.
    pub credits: i64,
}

/// Sign-up result.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpResponse {
    /// User ID.
    pub user_id: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Credit balance, when a session was opened.
    #[serde(default)]
    pub credits: Option<i64>,
    /// Whether the email must be confirmed before signing in.
    #[serde(default)]
    pub confirmation_required: bool,
}

/// Profile of the signed-in user.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    /// User ID.
    pub user_id: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Current credit balance.
    pub credits: i64,
    /// Whether a billing customer is linked.
    pub has_billing_account: bool,
    /// Public handle.
    #[serde(default)]
    pub username: Option<String>,
    /// Display name.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Personal website.
    #[serde(default)]
    pub website_url: Option<String>,
    /// Created timestamp (RFC 3339).
    pub created_at: String,
    /// Last update timestamp (RFC 3339).
    pub updated_at: String,
}

/// A gallery entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageInfo {
    /// Image ID.
    pub id: String,
    /// Prompt that produced the image.
    pub prompt: String,
    /// Image model.
    pub model: String,
    /// Credits spent.
    pub cost: i64,
    /// Short-lived URL, absent if the server could not sign one.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Created timestamp (RFC 3339).
    pub created_at: String,
}

/// One page of the gallery.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagePage {
    /// Images (newest first).
    pub images: Vec<ImageInfo>,
    /// Whether there are more images.
    pub has_more: bool,
}

/// A ledger entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionInfo {
    /// Transaction ID.
    pub id: String,
    /// Credits added (positive) or spent (negative).
    pub amount: i64,
    /// Transaction kind.
    pub kind: String,
    /// Balance after this transaction.
    pub balance_after: i64,
    /// Description.
    pub description: String,
    /// Timestamp.
    pub created_at: String,
}

/// One page of the ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionPage {
    /// Current balance.
    pub balance: i64,
    /// Transactions (newest first).
    pub transactions: Vec<TransactionInfo>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckoutRequest<'a> {
    pub price_id: &'a str,
}

/// A started checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutResponse {
    /// Stripe checkout session ID.
    pub session_id: String,
    /// Hosted checkout URL.
    pub url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateRequest<'a> {
    pub prompt: &'a str,
}

/// A generated image.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    /// Signed URL of the stored image.
    pub image_url: String,
    /// Balance after the debit.
    pub new_credits: i64,
    /// ID of the new image record.
    pub image_id: String,
}

/// API error response envelope.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
