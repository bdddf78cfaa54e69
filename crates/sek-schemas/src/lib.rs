//! sek-schemas
//!
//! Shared value types for the storefront entitlement kit: product catalog
//! descriptors, signed transaction envelopes, and the payload shape carried
//! inside them.
//!
//! Everything here is a plain serde value type. No IO, no verification logic
//! (that lives in `sek-verify`), no reconciliation rules (`sek-reconcile`).

use serde::{Deserialize, Serialize};

/// Micros scale (1e-6) used for all prices.
///
/// Prices are integer micros of the store currency so catalog sorting and
/// comparisons never touch floating point; the preformatted `display_price`
/// string is what surfaces to users.
pub const MICROS_SCALE: i64 = 1_000_000;

// ---------------------------------------------------------------------------
// Product catalog
// ---------------------------------------------------------------------------

/// Store product kind. Drives how a transaction for the product is applied:
/// consumables grant a counter, everything else is a standing entitlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Consumable,
    NonConsumable,
    AutoRenewable,
}

/// Introductory offer attached to a subscription product (free trial or
/// discounted first period). Eligibility is per-user and queried separately.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroductoryOffer {
    pub display_price: String,
    pub price_micros: i64,
    pub period_days: i64,
}

/// Promotional offer attached to a subscription product, redeemable by
/// existing or lapsed subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionalOffer {
    pub offer_id: String,
    pub display_price: String,
    pub price_micros: i64,
    pub period_days: i64,
}

/// Immutable catalog entry as returned by the platform catalog service.
///
/// `id` is globally unique. `subscription_group_id` is present only for
/// auto-renewable products; tiers sharing a group are mutually exclusive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    pub id: String,
    pub kind: ProductKind,
    pub display_name: String,
    pub price_micros: i64,
    pub display_price: String,
    pub subscription_group_id: Option<String>,
    pub introductory_offer: Option<IntroductoryOffer>,
    pub promotional_offers: Vec<PromotionalOffer>,
}

impl ProductDescriptor {
    /// Consumable product (no standing entitlement).
    pub fn consumable(
        id: impl Into<String>,
        display_name: impl Into<String>,
        price_micros: i64,
        display_price: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ProductKind::Consumable,
            display_name: display_name.into(),
            price_micros,
            display_price: display_price.into(),
            subscription_group_id: None,
            introductory_offer: None,
            promotional_offers: Vec::new(),
        }
    }

    /// Non-consumable product (permanent entitlement once purchased).
    pub fn non_consumable(
        id: impl Into<String>,
        display_name: impl Into<String>,
        price_micros: i64,
        display_price: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ProductKind::NonConsumable,
            display_name: display_name.into(),
            price_micros,
            display_price: display_price.into(),
            subscription_group_id: None,
            introductory_offer: None,
            promotional_offers: Vec::new(),
        }
    }

    /// Auto-renewable subscription tier inside `group_id`.
    pub fn auto_renewable(
        id: impl Into<String>,
        display_name: impl Into<String>,
        price_micros: i64,
        display_price: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ProductKind::AutoRenewable,
            display_name: display_name.into(),
            price_micros,
            display_price: display_price.into(),
            subscription_group_id: Some(group_id.into()),
            introductory_offer: None,
            promotional_offers: Vec::new(),
        }
    }

    /// Attach an introductory offer (builder-style, used by catalog setup).
    pub fn with_introductory_offer(mut self, offer: IntroductoryOffer) -> Self {
        self.introductory_offer = Some(offer);
        self
    }
}

// ---------------------------------------------------------------------------
// Subscription renewal state
// ---------------------------------------------------------------------------

/// Renewal state reported by the ledger for an auto-renewable entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalState {
    Subscribed,
    Expired,
    InGracePeriod,
    Revoked,
    InBillingRetryPeriod,
    Unknown,
}

/// Subscription facts carried by an auto-renewable transaction payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub group_id: String,
    pub renewal_state: RenewalState,
    pub auto_renew_enabled: bool,
}

// ---------------------------------------------------------------------------
// Transaction envelope + payload
// ---------------------------------------------------------------------------

/// Opaque signed envelope as delivered by the platform ledger.
///
/// `payload_json` is not to be trusted until the signature has been checked
/// by the verification gate; nothing outside `sek-verify` should decode it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub payload_json: String,
    pub signature: String,
}

/// Transaction payload carried inside a [`SignedEnvelope`].
///
/// Revocation and upgrade facts are supplied by the upstream ledger, never
/// computed locally. `revocation_at_ms` set and in the past means the grant
/// has been clawed back (refund, admin action). `is_upgraded` means a
/// higher-priority tier in the same subscription group superseded this
/// transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub transaction_id: String,
    pub product_id: String,
    pub kind: ProductKind,
    pub purchased_at_ms: i64,
    pub revocation_at_ms: Option<i64>,
    pub is_upgraded: bool,
    pub subscription: Option<SubscriptionInfo>,
}

impl TransactionPayload {
    /// Serialize to the canonical JSON document placed inside an envelope.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from an envelope's payload document.
    pub fn from_json(payload_json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> TransactionPayload {
        TransactionPayload {
            transaction_id: "txn-1".to_string(),
            product_id: "premium.monthly".to_string(),
            kind: ProductKind::AutoRenewable,
            purchased_at_ms: 1_700_000_000_000,
            revocation_at_ms: None,
            is_upgraded: false,
            subscription: Some(SubscriptionInfo {
                group_id: "premium".to_string(),
                renewal_state: RenewalState::Subscribed,
                auto_renew_enabled: true,
            }),
        }
    }

    #[test]
    fn payload_json_round_trip_preserves_all_fields() {
        let payload = sample_payload();
        let json = payload.to_json().unwrap();
        let decoded = TransactionPayload::from_json(&json).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn product_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ProductKind::AutoRenewable).unwrap();
        assert_eq!(json, "\"auto_renewable\"");
    }

    #[test]
    fn auto_renewable_constructor_sets_group() {
        let p = ProductDescriptor::auto_renewable(
            "premium.yearly",
            "Premium (Yearly)",
            49_990_000,
            "$49.99",
            "premium",
        );
        assert_eq!(p.kind, ProductKind::AutoRenewable);
        assert_eq!(p.subscription_group_id.as_deref(), Some("premium"));
        assert!(p.introductory_offer.is_none());
    }

    #[test]
    fn with_introductory_offer_attaches_offer() {
        let p = ProductDescriptor::auto_renewable(
            "premium.monthly",
            "Premium (Monthly)",
            4_990_000,
            "$4.99",
            "premium",
        )
        .with_introductory_offer(IntroductoryOffer {
            display_price: "Free".to_string(),
            price_micros: 0,
            period_days: 7,
        });
        assert_eq!(p.introductory_offer.unwrap().period_days, 7);
    }
}
