//! Price catalog: maps payment provider price ids to credit amounts.
//!
//! One-time prices are credited when their checkout session completes.
//! Subscription prices are credited on every paid subscription invoice.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::CoreError;

/// Credits debited per image generation unless configured otherwise.
pub const DEFAULT_GENERATION_COST: i64 = 1;

/// How a price is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceKind {
    /// A one-time credit pack (checkout mode `payment`).
    OneTime,
    /// A recurring plan (checkout mode `subscription`).
    Subscription,
}

impl PriceKind {
    /// The checkout session mode for this kind of price.
    #[must_use]
    pub const fn checkout_mode(&self) -> &'static str {
        match self {
            Self::OneTime => "payment",
            Self::Subscription => "subscription",
        }
    }
}

/// A purchasable price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    /// Payment provider price id.
    pub price_id: String,
    /// Display name.
    pub name: String,
    /// One-time or subscription.
    pub kind: PriceKind,
    /// Credits granted per payment.
    pub credits: i64,
    /// Display price in the currency's minor unit.
    #[serde(default)]
    pub unit_amount: Option<i64>,
    /// ISO currency code of `unit_amount`.
    #[serde(default)]
    pub currency: Option<String>,
}

impl PriceTier {
    fn new(price_id: &str, name: &str, kind: PriceKind, credits: i64, unit_amount: i64) -> Self {
        Self {
            price_id: price_id.to_string(),
            name: name.to_string(),
            kind,
            credits,
            unit_amount: Some(unit_amount),
            currency: Some("brl".to_string()),
        }
    }
}

/// The set of prices the service accepts and credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingCatalog {
    /// All tiers, in display order.
    pub tiers: Vec<PriceTier>,
}

impl Default for PricingCatalog {
    fn default() -> Self {
        Self {
            tiers: vec![
                PriceTier::new("price_basic_pack", "Basic", PriceKind::OneTime, 50, 500),
                PriceTier::new("price_standard_pack", "Standard", PriceKind::OneTime, 200, 1500),
                PriceTier::new("price_premium_pack", "Premium", PriceKind::OneTime, 1000, 5000),
                PriceTier::new("price_basic_monthly", "Basic", PriceKind::Subscription, 30, 350),
                PriceTier::new(
                    "price_standard_monthly",
                    "Standard",
                    PriceKind::Subscription,
                    150,
                    1000,
                ),
                PriceTier::new(
                    "price_premium_monthly",
                    "Premium",
                    PriceKind::Subscription,
                    700,
                    3500,
                ),
                PriceTier::new(
                    "price_essential_monthly",
                    "Essential",
                    PriceKind::Subscription,
                    100,
                    799,
                ),
            ],
        }
    }
}

impl PricingCatalog {
    /// Build a catalog, rejecting duplicate price ids and non-positive credits.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DuplicatePrice` or `CoreError::InvalidPriceEntry`.
    pub fn new(tiers: Vec<PriceTier>) -> Result<Self, CoreError> {
        let mut seen = HashSet::new();
        for tier in &tiers {
            if !seen.insert(tier.price_id.as_str()) {
                return Err(CoreError::DuplicatePrice(tier.price_id.clone()));
            }
            if tier.credits <= 0 {
                return Err(CoreError::InvalidPriceEntry {
                    entry: tier.price_id.clone(),
                    reason: "credits must be positive".into(),
                });
            }
        }
        Ok(Self { tiers })
    }

    /// Parse a JSON catalog (`{"tiers": [...]}`).
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the tiers are invalid.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let catalog: Self = serde_json::from_str(json)?;
        Self::new(catalog.tiers)
    }

    /// Build a catalog from `price_id=credits` lists, one per price kind.
    ///
    /// Entries are comma separated; blank entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed entries or duplicate ids.
    pub fn from_price_maps(one_time: &str, subscription: &str) -> Result<Self, CoreError> {
        let mut tiers = parse_price_map(one_time, PriceKind::OneTime)?;
        tiers.extend(parse_price_map(subscription, PriceKind::Subscription)?);
        Self::new(tiers)
    }

    /// Look up any tier by price id.
    #[must_use]
    pub fn tier(&self, price_id: &str) -> Option<&PriceTier> {
        self.tiers.iter().find(|t| t.price_id == price_id)
    }

    /// Credits for a one-time price, if the id is a known one-time price.
    #[must_use]
    pub fn one_time_credits(&self, price_id: &str) -> Option<i64> {
        self.credits_for(price_id, PriceKind::OneTime)
    }

    /// Credits for a subscription price, if the id is a known subscription price.
    #[must_use]
    pub fn subscription_credits(&self, price_id: &str) -> Option<i64> {
        self.credits_for(price_id, PriceKind::Subscription)
    }

    fn credits_for(&self, price_id: &str, kind: PriceKind) -> Option<i64> {
        self.tier(price_id)
            .filter(|t| t.kind == kind)
            .map(|t| t.credits)
    }
}

fn parse_price_map(raw: &str, kind: PriceKind) -> Result<Vec<PriceTier>, CoreError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (price_id, credits) =
                entry
                    .split_once('=')
                    .ok_or_else(|| CoreError::InvalidPriceEntry {
                        entry: entry.to_string(),
                        reason: "expected price_id=credits".into(),
                    })?;
            let price_id = price_id.trim();
            if price_id.is_empty() {
                return Err(CoreError::InvalidPriceEntry {
                    entry: entry.to_string(),
                    reason: "empty price id".into(),
                });
            }
            let credits = credits
                .trim()
                .parse::<i64>()
                .map_err(|e| CoreError::InvalidPriceEntry {
                    entry: entry.to_string(),
                    reason: e.to_string(),
                })?;
            Ok(PriceTier {
                price_id: price_id.to_string(),
                name: price_id.to_string(),
                kind,
                credits,
                unit_amount: None,
                currency: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_valid() {
        let catalog = PricingCatalog::default();
        assert!(PricingCatalog::new(catalog.tiers.clone()).is_ok());
        assert_eq!(catalog.one_time_credits("price_basic_pack"), Some(50));
        assert_eq!(catalog.subscription_credits("price_standard_monthly"), Some(150));
    }

    #[test]
    fn lookups_respect_price_kind() {
        let catalog = PricingCatalog::default();
        assert_eq!(catalog.subscription_credits("price_basic_pack"), None);
        assert_eq!(catalog.one_time_credits("price_basic_monthly"), None);
        assert_eq!(catalog.one_time_credits("price_unknown"), None);
    }

    #[test]
    fn price_maps_parse_both_kinds() {
        let catalog =
            PricingCatalog::from_price_maps("price_a=1, price_b = 20", "price_sub=10,").unwrap();
        assert_eq!(catalog.one_time_credits("price_a"), Some(1));
        assert_eq!(catalog.one_time_credits("price_b"), Some(20));
        assert_eq!(catalog.subscription_credits("price_sub"), Some(10));
        assert_eq!(catalog.tier("price_sub").unwrap().kind.checkout_mode(), "subscription");
    }

    #[test]
    fn price_maps_reject_garbage() {
        assert!(PricingCatalog::from_price_maps("price_a", "").is_err());
        assert!(PricingCatalog::from_price_maps("price_a=ten", "").is_err());
        assert!(PricingCatalog::from_price_maps("=5", "").is_err());
        assert!(PricingCatalog::from_price_maps("price_a=0", "").is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected_across_kinds() {
        let err = PricingCatalog::from_price_maps("price_a=1", "price_a=2").unwrap_err();
        assert!(matches!(err, CoreError::DuplicatePrice(id) if id == "price_a"));
    }

    #[test]
    fn json_catalog_parses() {
        let json = r#"{"tiers":[
            {"price_id":"price_x","name":"X","kind":"one_time","credits":5},
            {"price_id":"price_y","name":"Y","kind":"subscription","credits":9,"unit_amount":990,"currency":"usd"}
        ]}"#;
        let catalog = PricingCatalog::from_json(json).unwrap();
        assert_eq!(catalog.one_time_credits("price_x"), Some(5));
        assert_eq!(catalog.tier("price_y").unwrap().unit_amount, Some(990));
    }
}
