//! Transaction classification: route a verified transaction by product kind
//! and expose the revocation/upgrade facts carried by the ledger.
//!
//! Revocation and upgrade are upstream facts, not local computations — this
//! module only reads them off the transaction.

use sek_schemas::ProductKind;
use sek_verify::VerifiedTransaction;

use crate::coins::COIN_GRANT_AMOUNT;

/// What the push path should do with one verified transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Consumable: credit the coin balance (idempotently, per transaction id).
    /// Standing entitlements are untouched.
    GrantCoins { amount: i64 },
    /// Non-consumable or subscription: a single event cannot disambiguate
    /// mutual exclusivity inside a subscription group, so the entitlement set
    /// must be rebuilt from the ledger's current-entitlements view.
    RefreshEntitlements,
}

/// Route one verified transaction.
pub fn disposition(tx: &VerifiedTransaction) -> Disposition {
    match tx.kind() {
        ProductKind::Consumable => Disposition::GrantCoins {
            amount: COIN_GRANT_AMOUNT,
        },
        ProductKind::NonConsumable | ProductKind::AutoRenewable => {
            Disposition::RefreshEntitlements
        }
    }
}

/// `true` when the transaction carries a revocation timestamp at or before
/// `now_ms`. A future-dated revocation is not yet effective.
pub fn is_revoked(tx: &VerifiedTransaction, now_ms: i64) -> bool {
    matches!(tx.revocation_at_ms(), Some(at_ms) if at_ms <= now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sek_schemas::{SignedEnvelope, TransactionPayload};
    use sek_verify::{EnvelopeGate, SharedSecretVerifier};

    fn verified(kind: ProductKind, revocation_at_ms: Option<i64>) -> VerifiedTransaction {
        let payload_json = TransactionPayload {
            transaction_id: "txn-1".to_string(),
            product_id: "p-1".to_string(),
            kind,
            purchased_at_ms: 1_000,
            revocation_at_ms,
            is_upgraded: false,
            subscription: None,
        }
        .to_json()
        .unwrap();
        let envelope = SignedEnvelope {
            signature: SharedSecretVerifier::new("k").sign(&payload_json),
            payload_json,
        };
        EnvelopeGate::shared_secret("k").verify(&envelope).unwrap()
    }

    #[test]
    fn consumable_routes_to_coin_grant() {
        let tx = verified(ProductKind::Consumable, None);
        assert_eq!(
            disposition(&tx),
            Disposition::GrantCoins {
                amount: COIN_GRANT_AMOUNT
            }
        );
    }

    #[test]
    fn non_consumable_and_subscription_route_to_refresh() {
        for kind in [ProductKind::NonConsumable, ProductKind::AutoRenewable] {
            let tx = verified(kind, None);
            assert_eq!(disposition(&tx), Disposition::RefreshEntitlements);
        }
    }

    #[test]
    fn revocation_is_effective_only_at_or_before_now() {
        let tx = verified(ProductKind::NonConsumable, Some(5_000));
        assert!(!is_revoked(&tx, 4_999), "future revocation not yet effective");
        assert!(is_revoked(&tx, 5_000), "revocation effective at its timestamp");
        assert!(is_revoked(&tx, 9_000), "past revocation stays effective");
    }

    #[test]
    fn missing_revocation_is_never_revoked() {
        let tx = verified(ProductKind::NonConsumable, None);
        assert!(!is_revoked(&tx, i64::MAX));
    }
}
