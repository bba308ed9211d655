//! Auth API types.

use serde::{Deserialize, Serialize};

/// A user as returned by the auth API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User id (UUID).
    pub id: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
}

/// A signed-in session.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// Access token (JWT).
    pub access_token: String,
    /// Lifetime of the access token in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// The signed-in user.
    pub user: User,
}

fn default_expires_in() -> u64 {
    3600
}

/// Result of a sign-up.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// The account is active and a session was issued.
    Session(Session),
    /// The account must be confirmed by email before signing in.
    ConfirmationRequired(User),
}

/// Error body shapes used by the auth API.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuthErrorBody {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl AuthErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}
