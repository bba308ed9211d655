//! Stripe API types.

use std::collections::HashMap;

use serde::Deserialize;

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    pub id: String,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
}

/// Stripe Checkout session object.
///
/// Used both for the create response and for the object carried by
/// `checkout.session.completed` events.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// Checkout mode (`payment` or `subscription`).
    #[serde(default)]
    pub mode: Option<String>,
    /// Payment status (`paid`, `unpaid`, `no_payment_required`).
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Client reference ID (our `user_id`).
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Metadata set when the session was created.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Whether the session's payment is settled.
    ///
    /// A missing status is treated as settled.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status.as_deref(),
            None | Some("paid" | "no_payment_required")
        )
    }
}

/// Stripe invoice object, as carried by `invoice.payment_succeeded`.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    /// Invoice ID.
    pub id: String,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Why the invoice was created (`subscription_create`, `subscription_cycle`, ...).
    #[serde(default)]
    pub billing_reason: Option<String>,
    /// Invoice line items.
    #[serde(default)]
    pub lines: InvoiceLines,
}

impl Invoice {
    /// Whether the invoice was produced by a subscription.
    #[must_use]
    pub fn is_subscription(&self) -> bool {
        self.billing_reason
            .as_deref()
            .is_some_and(|reason| reason.starts_with("subscription"))
    }

    /// Price id of the first line item.
    #[must_use]
    pub fn first_price_id(&self) -> Option<&str> {
        self.lines
            .data
            .first()
            .and_then(|line| line.price.as_ref())
            .map(|price| price.id.as_str())
    }
}

/// Invoice line item list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceLines {
    /// Line items.
    #[serde(default)]
    pub data: Vec<InvoiceLineItem>,
}

/// Invoice line item.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLineItem {
    /// The price billed by this line.
    #[serde(default)]
    pub price: Option<Price>,
}

/// Stripe price reference.
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_session_reads_metadata() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "object": "checkout.session",
            "payment_status": "paid",
            "metadata": {"user_id": "u", "price_id": "price_basic_pack"}
        }))
        .unwrap();
        assert!(session.is_paid());
        assert_eq!(session.metadata["price_id"], "price_basic_pack");
    }

    #[test]
    fn unpaid_session_is_not_paid() {
        let session: CheckoutSession =
            serde_json::from_value(serde_json::json!({"id": "cs", "payment_status": "unpaid"}))
                .unwrap();
        assert!(!session.is_paid());
    }

    #[test]
    fn invoice_exposes_first_price() {
        let invoice: Invoice = serde_json::from_value(serde_json::json!({
            "id": "in_1",
            "customer": "cus_1",
            "billing_reason": "subscription_cycle",
            "lines": {"data": [{"price": {"id": "price_basic_monthly"}}, {"price": {"id": "other"}}]}
        }))
        .unwrap();
        assert!(invoice.is_subscription());
        assert_eq!(invoice.first_price_id(), Some("price_basic_monthly"));
    }

    #[test]
    fn manual_invoice_is_not_a_subscription() {
        let invoice: Invoice =
            serde_json::from_value(serde_json::json!({"id": "in_2", "billing_reason": "manual"}))
                .unwrap();
        assert!(!invoice.is_subscription());
        assert_eq!(invoice.first_price_id(), None);
    }
}
