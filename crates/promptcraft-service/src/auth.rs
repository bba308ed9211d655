//! Authentication extractor and session cookie helpers.
//!
//! `AuthUser` accepts an access token from the `Authorization: Bearer` header
//! or, failing that, from the session cookie. Tokens are validated locally
//! when an HS256 secret is configured, otherwise resolved through the auth API.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use promptcraft_core::UserId;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Audience claim carried by end-user access tokens.
pub const TOKEN_AUDIENCE: &str = "authenticated";

/// An authenticated user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID.
    pub user_id: UserId,
    /// Email address, when the token carries one.
    pub email: Option<String>,
    /// The raw access token.
    pub token: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = session_token(&parts.headers, &state.config.session_cookie_name)
                .ok_or(ApiError::Unauthorized)?;

            if let Some(secret) = &state.config.supabase_jwt_secret {
                let claims = validate_jwt(&token, secret)?;
                let user_id = claims
                    .sub
                    .parse::<UserId>()
                    .map_err(|_| ApiError::Unauthorized)?;
                return Ok(AuthUser {
                    user_id,
                    email: claims.email,
                    token,
                });
            }

            let identity = state.identity.as_ref().ok_or_else(|| {
                tracing::warn!("No JWT secret or auth API configured - rejecting request");
                ApiError::Unauthorized
            })?;

            let user = identity.get_user(&token).await.map_err(|e| {
                if e.is_rejection() {
                    tracing::debug!(error = %e, "Access token rejected by auth API");
                    ApiError::Unauthorized
                } else {
                    tracing::error!(error = %e, "Failed to resolve access token");
                    ApiError::ExternalService("Failed to verify session".into())
                }
            })?;

            let user_id = user.id.parse::<UserId>().map_err(|_| ApiError::Unauthorized)?;

            Ok(AuthUser {
                user_id,
                email: user.email,
                token,
            })
        })
    }
}

/// JWT claims of an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Audience.
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    /// Expiration time.
    pub exp: i64,
}

/// Validate an HS256 access token.
fn validate_jwt(token: &str, secret: &str) -> Result<JwtClaims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);

    decode::<JwtClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            ApiError::Unauthorized
        })
}

/// Extract the access token from the bearer header or the session cookie.
#[must_use]
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value that stores the access token.
#[must_use]
pub fn session_cookie(config: &ServiceConfig, token: &str, max_age_seconds: u64) -> String {
    let mut cookie = format!(
        "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}",
        config.session_cookie_name
    );
    if config.session_cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that clears the session cookie.
#[must_use]
pub fn clear_session_cookie(config: &ServiceConfig) -> String {
    session_cookie(config, "", 0)
}
