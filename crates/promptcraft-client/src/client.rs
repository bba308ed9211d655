//! Promptcraft HTTP client implementation.

use std::time::Duration;

use reqwest::header::SET_COOKIE;
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, CheckoutRequest, CheckoutResponse, CredentialsRequest, GenerateRequest,
    GenerateResponse, HealthResponse, ImagePage, PricingResponse, ProfileResponse, ProfileUpdate,
    SessionInfo, SignUpResponse, TransactionPage,
};

/// Promptcraft API client.
///
/// Authenticated calls send the access token as a bearer token. The token is
/// either supplied up front or captured from the session cookie on login.
#[derive(Debug, Clone)]
pub struct PromptcraftClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
    session_cookie_name: String,
}

impl PromptcraftClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the service (e.g., `"http://localhost:8080"`)
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a new client with custom options.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: options.access_token,
            session_cookie_name: options.session_cookie_name,
        })
    }

    /// The current access token, if signed in.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.access_token.as_ref().ok_or(ClientError::Unauthorized)?;
        Ok(request.bearer_auth(token))
    }

    // =========================================================================
    // Public
    // =========================================================================

    /// Check service health.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self.client.get(self.url("/health")).send().await?;
        Self::handle_response(response).await
    }

    /// List the configured prices.
    pub async fn pricing(&self) -> Result<PricingResponse, ClientError> {
        let response = self.client.get(self.url("/api/pricing")).send().await?;
        Self::handle_response(response).await
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Sign in and keep the session token for later calls.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<SessionInfo, ClientError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&CredentialsRequest { email, password })
            .send()
            .await?;

        let token = self.session_token(&response);
        let session: SessionInfo = Self::handle_response(response).await?;
        self.access_token = Some(token.ok_or(ClientError::MissingSession)?);

        tracing::debug!(user_id = %session.user_id, "Signed in");
        Ok(session)
    }

    /// Register an account. Keeps the session token when one is issued.
    pub async fn signup(&mut self, email: &str, password: &str) -> Result<SignUpResponse, ClientError> {
        let response = self
            .client
            .post(self.url("/auth/signup"))
            .json(&CredentialsRequest { email, password })
            .send()
            .await?;

        let token = self.session_token(&response);
        let outcome: SignUpResponse = Self::handle_response(response).await?;
        if token.is_some() {
            self.access_token = token;
        }
        Ok(outcome)
    }

    /// Sign out and forget the token.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let mut request = self.client.post(self.url("/auth/logout"));
        if let Some(token) = self.access_token.take() {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let _: serde_json::Value = Self::handle_response(response).await?;
        Ok(())
    }

    /// Get the signed-in user and balance.
    pub async fn session(&self) -> Result<SessionInfo, ClientError> {
        let response = self
            .authed(self.client.get(self.url("/api/session")))?
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn session_token(&self, response: &reqwest::Response) -> Option<String> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|cookie| cookie.split(';').next())
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == self.session_cookie_name && !value.is_empty())
            .map(|(_, value)| value.to_string())
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Get the profile.
    pub async fn profile(&self) -> Result<ProfileResponse, ClientError> {
        let response = self
            .authed(self.client.get(self.url("/api/profile")))?
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Update display fields.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<ProfileResponse, ClientError> {
        let response = self
            .authed(self.client.patch(self.url("/api/profile")))?
            .json(update)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    // =========================================================================
    // Images and credits
    // =========================================================================

    /// Generate an image, spending credits.
    pub async fn generate(&self, prompt: &str) -> Result<GenerateResponse, ClientError> {
        let response = self
            .authed(self.client.post(self.url("/api/generate")))?
            .json(&GenerateRequest { prompt })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// List images, newest first.
    pub async fn images(&self, limit: usize, offset: usize) -> Result<ImagePage, ClientError> {
        let response = self
            .authed(self.client.get(self.url("/api/images")))?
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Delete an image.
    pub async fn delete_image(&self, image_id: &str) -> Result<(), ClientError> {
        let response = self
            .authed(self.client.delete(self.url(&format!("/api/images/{image_id}"))))?
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(());
        }
        let _: serde_json::Value = Self::handle_response(response).await?;
        Ok(())
    }

    /// List credit transactions, newest first.
    pub async fn transactions(&self, limit: usize, offset: usize) -> Result<TransactionPage, ClientError> {
        let response = self
            .authed(self.client.get(self.url("/api/credits/transactions")))?
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Start a hosted checkout for a price. Redirect the user to the returned URL.
    pub async fn create_checkout(&self, price_id: &str) -> Result<CheckoutResponse, ClientError> {
        let response = self
            .authed(self.client.post(self.url("/api/checkout")))?
            .json(&CheckoutRequest { price_id })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let Ok(api_error) = response.json::<ApiErrorResponse>().await else {
            return Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            });
        };

        let error = api_error.error;
        let detail = |key: &str| {
            error
                .details
                .as_ref()
                .and_then(|d| d.get(key))
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0)
        };

        // Map specific error codes to typed errors
        match error.code.as_str() {
            "unauthorized" => Err(ClientError::Unauthorized),
            "insufficient_credits" => Err(ClientError::InsufficientCredits {
                balance: detail("balance"),
                required: detail("required"),
            }),
            "not_found" => Err(ClientError::NotFound(error.message)),
            code => Err(ClientError::Api {
                code: code.to_string(),
                message: error.message.clone(),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Access token to start with.
    pub access_token: Option<String>,
    /// Name of the session cookie set on login.
    pub session_cookie_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            access_token: None,
            session_cookie_name: "pc-access-token".to_string(),
        }
    }
}

impl ClientOptions {
    /// Options for an already issued access token.
    #[must_use]
    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            ..Self::default()
        }
    }
}
