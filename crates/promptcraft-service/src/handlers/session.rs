//! Sign-in, sign-up, sign-out and current-session handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use promptcraft_core::UserId;

use crate::auth::{clear_session_cookie, session_cookie, session_token, AuthUser};
use crate::error::ApiError;
use crate::identity::{IdentityError, Session, SignUpOutcome};
use crate::state::AppState;

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Email and password.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

impl CredentialsRequest {
    fn validate(&self) -> Result<(&str, &str), ApiError> {
        let email = self.email.trim();
        if email.is_empty() || self.password.is_empty() {
            return Err(ApiError::BadRequest(
                "Email and password are required".into(),
            ));
        }
        Ok((email, &self.password))
    }
}

/// The signed-in user.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// User ID.
    pub user_id: String,
    /// Email address.
    pub email: Option<String>,
    /// Current credit balance.
    pub credits: i64,
}

/// Sign-up result.
#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    /// User ID.
    pub user_id: String,
    /// Email address.
    pub email: Option<String>,
    /// Credit balance, when a session was opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<i64>,
    /// Whether the email must be confirmed before signing in.
    pub confirmation_required: bool,
}

/// Sign-out result.
#[derive(Debug, Serialize)]
pub struct SignOutResponse {
    /// Always true; the cookie is cleared regardless of the provider.
    pub signed_out: bool,
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::Internal(format!("auth API returned invalid user id: {e}")))
}

/// Map auth API failures for calls made with user-supplied credentials.
fn credential_error(e: &IdentityError) -> ApiError {
    if e.is_rejection() {
        tracing::debug!(error = %e, "Auth API rejected credentials");
        ApiError::Unauthorized
    } else {
        tracing::error!(error = %e, "Auth API request failed");
        ApiError::ExternalService("Authentication service unavailable".into())
    }
}

/// Ensure the profile exists and set the session cookie.
async fn open_session(state: &AppState, session: &Session) -> Result<Response, ApiError> {
    let user_id = parse_user_id(&session.user.id)?;
    let profile = state.store.ensure_profile(&user_id).await?;

    tracing::info!(user_id = %user_id, "User signed in");

    let cookie = session_cookie(&state.config, &session.access_token, session.expires_in);
    let body = SessionResponse {
        user_id: user_id.to_string(),
        email: session.user.email.clone(),
        credits: profile.credits,
    };
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Sign in with email and password.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Response, ApiError> {
    let (email, password) = body.validate()?;

    let session = state
        .identity()?
        .sign_in_with_password(email, password)
        .await
        .map_err(|e| credential_error(&e))?;

    open_session(&state, &session).await
}

/// Create an account.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Response, ApiError> {
    let (email, password) = body.validate()?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let outcome = state
        .identity()?
        .sign_up(email, password)
        .await
        .map_err(|e| {
            if e.is_already_registered() {
                ApiError::Conflict("Email already registered".into())
            } else if e.is_rejection() {
                ApiError::BadRequest(match &e {
                    IdentityError::Api { message, .. } => message.clone(),
                    _ => "Sign-up rejected".into(),
                })
            } else {
                tracing::error!(error = %e, "Sign-up failed");
                ApiError::ExternalService("Authentication service unavailable".into())
            }
        })?;

    match outcome {
        SignUpOutcome::Session(session) => {
            let response = open_session(&state, &session).await?;
            Ok((StatusCode::CREATED, response).into_response())
        }
        SignUpOutcome::ConfirmationRequired(user) => {
            tracing::info!(user_id = %user.id, "Sign-up pending email confirmation");
            let body = SignUpResponse {
                user_id: user.id,
                email: user.email,
                credits: None,
                confirmation_required: true,
            };
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
    }
}

/// Sign out and clear the session cookie.
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let (Some(token), Some(identity)) = (
        session_token(&headers, &state.config.session_cookie_name),
        state.identity.as_ref(),
    ) {
        if let Err(e) = identity.sign_out(&token).await {
            tracing::warn!(error = %e, "Provider sign-out failed; clearing cookie anyway");
        }
    }

    (
        [(SET_COOKIE, clear_session_cookie(&state.config))],
        Json(SignOutResponse { signed_out: true }),
    )
}

/// Get the current session.
pub async fn current_session(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<SessionResponse>, ApiError> {
    let profile = state.store.ensure_profile(&auth.user_id).await?;

    Ok(Json(SessionResponse {
        user_id: auth.user_id.to_string(),
        email: auth.email,
        credits: profile.credits,
    }))
}
