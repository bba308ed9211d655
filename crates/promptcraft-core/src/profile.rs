//! User profile types.
//!
//! A profile holds the credit balance and the billing-customer link for a user
//! of the auth provider, plus a few display fields edited from the profile page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::UserId;

/// Minimum username length.
pub const USERNAME_MIN_LEN: usize = 3;

/// Maximum username length.
pub const USERNAME_MAX_LEN: usize = 32;

/// A user's profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// The auth provider's user id.
    pub user_id: UserId,

    /// Current credit balance. Never negative.
    pub credits: i64,

    /// Payment provider customer id, set on first checkout.
    pub stripe_customer_id: Option<String>,

    /// Public handle.
    pub username: Option<String>,

    /// Display name.
    pub full_name: Option<String>,

    /// Personal website.
    pub website_url: Option<String>,

    /// When the profile was created.
    pub created_at: DateTime<Utc>,

    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Create an empty profile with zero credits.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            credits: 0,
            stripe_customer_id: None,
            username: None,
            full_name: None,
            website_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the balance covers a debit of `cost` credits.
    #[must_use]
    pub fn can_afford(&self, cost: i64) -> bool {
        self.credits >= cost
    }

    /// Apply a validated update to the display fields.
    ///
    /// Absent fields are kept; an empty string clears the field.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        set_or_clear(&mut self.username, update.username.as_deref());
        set_or_clear(&mut self.full_name, update.full_name.as_deref());
        set_or_clear(&mut self.website_url, update.website_url.as_deref());
        self.updated_at = Utc::now();
    }
}

fn set_or_clear(field: &mut Option<String>, value: Option<&str>) {
    match value {
        None => {}
        Some("") => *field = None,
        Some(value) => *field = Some(value.to_string()),
    }
}

/// A partial update of the profile display fields.
///
/// `None` leaves a field unchanged and `Some("")` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// New username.
    #[serde(default)]
    pub username: Option<String>,
    /// New display name.
    #[serde(default)]
    pub full_name: Option<String>,
    /// New website.
    #[serde(default)]
    pub website_url: Option<String>,
}

impl ProfileUpdate {
    /// Trim the fields and validate them.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidField` for a malformed username or website.
    pub fn normalized(&self) -> Result<Self, CoreError> {
        let username = self.username.as_deref().map(str::trim).map(String::from);
        if let Some(name) = username.as_ref().filter(|n| !n.is_empty()) {
            let len = name.chars().count();
            if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
                return Err(CoreError::InvalidField {
                    field: "username",
                    reason: format!(
                        "must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
                    ),
                });
            }
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(CoreError::InvalidField {
                    field: "username",
                    reason: "may only contain letters, digits and underscores".into(),
                });
            }
        }

        let website_url = self.website_url.as_deref().map(str::trim).map(String::from);
        if let Some(url) = website_url.as_ref().filter(|u| !u.is_empty()) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(CoreError::InvalidField {
                    field: "website_url",
                    reason: "must start with http:// or https://".into(),
                });
            }
        }

        Ok(Self {
            username,
            full_name: self.full_name.as_deref().map(str::trim).map(String::from),
            website_url,
        })
    }

    /// The username this update sets, if any.
    #[must_use]
    pub fn new_username(&self) -> Option<&str> {
        self.username.as_deref().filter(|n| !n.is_empty())
    }

    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.full_name.is_none() && self.website_url.is_none()
    }
}
