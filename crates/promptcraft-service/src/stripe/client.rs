//! Stripe API client implementation.

use std::time::Duration;

use reqwest::Client;

use super::types::{CheckoutSession, Customer, StripeErrorResponse};

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Signature header is missing its timestamp or signatures.
    #[error("Malformed webhook signature header")]
    MalformedSignature,

    /// Signature timestamp is outside the tolerance window.
    #[error("Webhook timestamp outside tolerance")]
    TimestampOutOfTolerance,

    /// Invalid webhook signature.
    #[error("Invalid webhook signature")]
    InvalidSignature,
}

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    /// Stripe customer to attach the session to.
    pub customer_id: &'a str,
    /// Our user id, sent as `client_reference_id` and metadata.
    pub user_id: &'a str,
    /// Stripe price id for the single line item.
    pub price_id: &'a str,
    /// `payment` or `subscription`.
    pub mode: &'a str,
    /// Redirect after payment.
    pub success_url: &'a str,
    /// Redirect when the user backs out.
    pub cancel_url: &'a str,
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    pub const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: Self::BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a new Stripe customer.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Our internal user ID (stored as metadata)
    /// * `email` - Optional customer email
    pub async fn create_customer(
        &self,
        user_id: &str,
        email: Option<&str>,
    ) -> Result<Customer, StripeError> {
        let mut params = vec![("metadata[user_id]", user_id.to_string())];
        if let Some(email) = email {
            params.push(("email", email.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/customers", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Create a hosted Checkout session for one price.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let mut params = vec![
            ("mode", request.mode.to_string()),
            ("customer", request.customer_id.to_string()),
            ("success_url", request.success_url.to_string()),
            ("cancel_url", request.cancel_url.to_string()),
            ("client_reference_id", request.user_id.to_string()),
            ("line_items[0][price]", request.price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[user_id]", request.user_id.to_string()),
            ("metadata[price_id]", request.price_id.to_string()),
        ];

        if request.mode == "subscription" {
            params.push((
                "subscription_data[metadata][user_id]",
                request.user_id.to_string(),
            ));
        }

        tracing::debug!(
            user_id = %request.user_id,
            price_id = %request.price_id,
            mode = %request.mode,
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        match response.json::<StripeErrorResponse>().await {
            Ok(stripe_error) => Err(StripeError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request<'a>(mode: &'a str) -> CheckoutRequest<'a> {
        CheckoutRequest {
            customer_id: "cus_123",
            user_id: "user-1",
            price_id: "price_basic_monthly",
            mode,
            success_url: "http://app/payment/success?session_id={CHECKOUT_SESSION_ID}",
            cancel_url: "http://app/payment/cancelled",
        }
    }

    #[tokio::test]
    async fn create_customer_sends_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .and(header_exists("authorization"))
            .and(body_string_contains("metadata%5Buser_id%5D=user-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cus_123", "object": "customer", "email": "a@b.c"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = StripeClient::new("sk_test")
            .unwrap()
            .with_base_url(format!("{}/v1", server.uri()));
        let customer = client.create_customer("user-1", Some("a@b.c")).await.unwrap();
        assert_eq!(customer.id, "cus_123");
    }

    #[tokio::test]
    async fn subscription_checkout_tags_the_subscription() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("mode=subscription"))
            .and(body_string_contains(
                "subscription_data%5Bmetadata%5D%5Buser_id%5D=user-1",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_1", "url": "https://checkout.stripe.com/c/pay/cs_test_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = StripeClient::new("sk_test")
            .unwrap()
            .with_base_url(format!("{}/v1", server.uri()));
        let session = client
            .create_checkout_session(&request("subscription"))
            .await
            .unwrap();
        assert_eq!(session.id, "cs_test_1");
        assert!(session.url.is_some());
    }

    #[tokio::test]
    async fn api_errors_are_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"type": "invalid_request_error", "message": "No such price", "code": "resource_missing"}
            })))
            .mount(&server)
            .await;

        let client = StripeClient::new("sk_test")
            .unwrap()
            .with_base_url(format!("{}/v1", server.uri()));
        let err = client
            .create_checkout_session(&request("payment"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StripeError::Api { ref code, .. } if code.as_deref() == Some("resource_missing")
        ));
    }
}
