//! Error types for promptcraft core.

use crate::ids::IdError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while building or validating core types.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// A price map entry could not be parsed.
    #[error("invalid price entry '{entry}': {reason}")]
    InvalidPriceEntry {
        /// The offending entry.
        entry: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The same price id appears more than once in a catalog.
    #[error("duplicate price id: {0}")]
    DuplicatePrice(String),

    /// A profile field failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
