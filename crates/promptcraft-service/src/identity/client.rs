//! Supabase Auth (GoTrue) REST client.

use std::time::Duration;

use reqwest::Client;

use super::types::{AuthErrorBody, Session, SignUpOutcome, User};

/// Error type for auth API operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The auth API rejected the request.
    #[error("auth API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Machine-readable code, when the API sends one.
        code: Option<String>,
        /// Error message from the API.
        message: String,
    },

    /// The response could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IdentityError {
    /// Whether the API refused the request as unauthenticated or with bad
    /// credentials.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { status, .. } if (400..500).contains(status))
    }

    /// Whether a sign-up failed because the email is taken.
    #[must_use]
    pub fn is_already_registered(&self) -> bool {
        match self {
            Self::Api { code, message, .. } => {
                code.as_deref() == Some("user_already_exists")
                    || message.to_lowercase().contains("already registered")
            }
            _ => false,
        }
    }
}

/// Auth API client.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl AuthClient {
    /// Create a client for the project at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.base_url)
    }

    /// Sign in with email and password.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let response = self
            .client
            .post(self.url("/token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        Ok(Self::handle_response(response).await?.json().await?)
    }

    /// Register a new account.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, IdentityError> {
        let response = self
            .client
            .post(self.url("/signup"))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let body: serde_json::Value = Self::handle_response(response).await?.json().await?;

        // With autoconfirm the API answers with a session, otherwise with the bare user.
        if body.get("access_token").is_some() {
            Ok(SignUpOutcome::Session(serde_json::from_value(body)?))
        } else {
            let user = match body.get("user") {
                Some(user) => serde_json::from_value(user.clone())?,
                None => serde_json::from_value(body)?,
            };
            Ok(SignUpOutcome::ConfirmationRequired(user))
        }
    }

    /// Revoke the session behind an access token.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(self.url("/logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        Self::handle_response(response).await.map(|_| ())
    }

    /// Resolve the user behind an access token.
    pub async fn get_user(&self, access_token: &str) -> Result<User, IdentityError> {
        let response = self
            .client
            .get(self.url("/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        Ok(Self::handle_response(response).await?.json().await?)
    }

    async fn handle_response(response: reqwest::Response) -> Result<reqwest::Response, IdentityError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<AuthErrorBody>().await.unwrap_or_default();
        let code = body.error_code.clone();
        let message = body
            .into_message()
            .unwrap_or_else(|| format!("HTTP {status}"));

        Err(IdentityError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> AuthClient {
        AuthClient::new(server.uri(), "anon-key").unwrap()
    }

    #[tokio::test]
    async fn password_sign_in_returns_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "jwt", "token_type": "bearer", "expires_in": 1800,
                "refresh_token": "r", "user": {"id": "5f1c7c2e-8d4b-4a53-9a43-8f3a3c2e1b10", "email": "a@b.c"}
            })))
            .mount(&server)
            .await;

        let session = client(&server)
            .sign_in_with_password("a@b.c", "secret1")
            .await
            .unwrap();
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.expires_in, 1800);
        assert_eq!(session.user.email.as_deref(), Some("a@b.c"));
    }

    #[tokio::test]
    async fn bad_credentials_are_a_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant", "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .sign_in_with_password("a@b.c", "nope")
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert!(err.to_string().contains("Invalid login credentials"));
    }

    #[tokio::test]
    async fn sign_up_without_session_needs_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "5f1c7c2e-8d4b-4a53-9a43-8f3a3c2e1b10", "email": "a@b.c", "confirmation_sent_at": "2024-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let outcome = client(&server).sign_up("a@b.c", "secret1").await.unwrap();
        assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(user) if user.email.as_deref() == Some("a@b.c")));
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_detected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "code": 422, "error_code": "user_already_exists", "msg": "User already registered"
            })))
            .mount(&server)
            .await;

        let err = client(&server).sign_up("a@b.c", "secret1").await.unwrap_err();
        assert!(err.is_already_registered());
    }

    #[tokio::test]
    async fn get_user_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "5f1c7c2e-8d4b-4a53-9a43-8f3a3c2e1b10", "email": "a@b.c"
            })))
            .mount(&server)
            .await;

        let user = client(&server).get_user("jwt").await.unwrap();
        assert_eq!(user.id, "5f1c7c2e-8d4b-4a53-9a43-8f3a3c2e1b10");
    }
}
