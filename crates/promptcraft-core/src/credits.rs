//! Credit ledger types.
//!
//! Every balance change writes a `CreditTransaction`. Grants coming from the
//! payment provider carry the provider event id, which makes the ledger double
//! as the idempotency record for webhook deliveries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ImageId, TransactionId, UserId};

/// A single entry of the credit ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction id (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose balance changed.
    pub user_id: UserId,

    /// Credits added (positive) or debited (negative).
    pub amount: i64,

    /// Why the balance changed.
    pub kind: TransactionKind,

    /// Balance right after this entry was applied.
    pub balance_after: i64,

    /// Human-readable description.
    pub description: String,

    /// Payment provider event that produced the entry, for grants.
    pub source_event_id: Option<String>,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Ledger entry for an applied grant.
    #[must_use]
    pub fn from_grant(grant: &CreditGrant, balance_after: i64) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id: grant.user_id,
            amount: grant.credits,
            kind: grant.kind,
            balance_after,
            description: grant.description.clone(),
            source_event_id: Some(grant.event_id.clone()),
            created_at: Utc::now(),
        }
    }

    /// Ledger entry for an image generation debit.
    #[must_use]
    pub fn generation(
        user_id: UserId,
        image_id: &ImageId,
        cost: i64,
        balance_after: i64,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount: -cost,
            kind: TransactionKind::Generation,
            balance_after,
            description: format!("Image generation {image_id}"),
            source_event_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Type of credit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// One-time credit pack purchase.
    Purchase,

    /// Credits granted by a paid subscription invoice.
    SubscriptionGrant,

    /// Credits spent on an image generation.
    Generation,
}

impl TransactionKind {
    /// Stable string form, as stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::SubscriptionGrant => "subscription_grant",
            Self::Generation => "generation",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "purchase" => Some(Self::Purchase),
            "subscription_grant" => Some(Self::SubscriptionGrant),
            "generation" => Some(Self::Generation),
            _ => None,
        }
    }

    /// Whether this kind adds credits.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::Purchase | Self::SubscriptionGrant)
    }
}

/// A request to add credits, derived from one payment provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditGrant {
    /// Provider event id; a grant is applied at most once per id.
    pub event_id: String,
    /// Provider event type, for logging.
    pub event_type: String,
    /// Recipient.
    pub user_id: UserId,
    /// Credits to add (positive).
    pub credits: i64,
    /// Purchase or subscription grant.
    pub kind: TransactionKind,
    /// Ledger description.
    pub description: String,
}

/// Result of applying a `CreditGrant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Credits were added; carries the new balance.
    Applied {
        /// Balance after the grant.
        balance: i64,
    },
    /// The event id was already applied; nothing changed.
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(credits: i64) -> CreditGrant {
        CreditGrant {
            event_id: "evt_1".into(),
            event_type: "checkout.session.completed".into(),
            user_id: UserId::generate(),
            credits,
            kind: TransactionKind::Purchase,
            description: "Credit pack".into(),
        }
    }

    #[test]
    fn grant_entry_keeps_event_id() {
        let grant = grant(50);
        let tx = CreditTransaction::from_grant(&grant, 70);
        assert_eq!(tx.amount, 50);
        assert_eq!(tx.balance_after, 70);
        assert_eq!(tx.source_event_id.as_deref(), Some("evt_1"));
        assert_eq!(tx.kind, TransactionKind::Purchase);
    }

    #[test]
    fn generation_entry_is_negative() {
        let tx = CreditTransaction::generation(UserId::generate(), &ImageId::generate(), 1, 4);
        assert_eq!(tx.amount, -1);
        assert_eq!(tx.kind, TransactionKind::Generation);
        assert!(tx.source_event_id.is_none());
    }

    #[test]
    fn kind_string_form_roundtrips() {
        for kind in [
            TransactionKind::Purchase,
            TransactionKind::SubscriptionGrant,
            TransactionKind::Generation,
        ] {
            assert_eq!(TransactionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionKind::parse("refund"), None);
        assert!(TransactionKind::Purchase.is_credit());
        assert!(!TransactionKind::Generation.is_credit());
    }
}
