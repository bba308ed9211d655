//! Client error types.

/// Errors that can occur when using the promptcraft client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The access token is missing, expired or was rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// Insufficient credits.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The login response carried no session cookie.
    #[error("no session token in response")]
    MissingSession,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
