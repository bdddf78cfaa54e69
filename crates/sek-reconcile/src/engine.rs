use std::collections::BTreeSet;

use sek_schemas::ProductKind;
use sek_verify::VerifiedTransaction;

use crate::classify::is_revoked;
use crate::{Rebuild, SkipReason, SkippedEntry, SubscriptionStanding};

/// Rebuild the owned-product set from the ledger's current-entitlements view.
///
/// Filtering rules, applied per entry:
/// - Consumable: ignored (the entitlement view should never contain one).
/// - `is_upgraded`: superseded by a sibling tier, excluded.
/// - Revocation timestamp at or before `now_ms`: excluded.
///
/// Everything that survives lands in a **fresh** set. The previous set is
/// never consulted, so stale and mutually-exclusive entries disappear without
/// any diffing logic.
///
/// Among surviving auto-renewable entries the most recently purchased one
/// determines the subscription standing (tie broken by product id). The
/// ledger guarantees at most one live entry per subscription group, so with a
/// single group this is simply "the" surviving subscription; the ordering rule
/// keeps the result independent of entry order either way.
pub fn rebuild(entries: &[VerifiedTransaction], now_ms: i64) -> Rebuild {
    let mut owned: BTreeSet<String> = BTreeSet::new();
    let mut skipped: Vec<SkippedEntry> = Vec::new();
    let mut standing: Option<(i64, SubscriptionStanding)> = None;

    for tx in entries {
        let reason = if tx.kind() == ProductKind::Consumable {
            Some(SkipReason::ConsumableInLedger)
        } else if tx.is_upgraded() {
            Some(SkipReason::Upgraded)
        } else if is_revoked(tx, now_ms) {
            Some(SkipReason::Revoked)
        } else {
            None
        };

        if let Some(reason) = reason {
            skipped.push(SkippedEntry {
                transaction_id: tx.transaction_id().to_string(),
                product_id: tx.product_id().to_string(),
                reason,
            });
            continue;
        }

        owned.insert(tx.product_id().to_string());

        if tx.kind() == ProductKind::AutoRenewable {
            if let Some(sub) = tx.subscription() {
                let candidate = SubscriptionStanding {
                    product_id: tx.product_id().to_string(),
                    renewal_state: sub.renewal_state,
                    auto_renew_enabled: sub.auto_renew_enabled,
                };
                let replace = match &standing {
                    None => true,
                    Some((at_ms, current)) => {
                        tx.purchased_at_ms() > *at_ms
                            || (tx.purchased_at_ms() == *at_ms
                                && candidate.product_id > current.product_id)
                    }
                };
                if replace {
                    standing = Some((tx.purchased_at_ms(), candidate));
                }
            }
        }
    }

    // Stable ordering for skip evidence (deterministic output).
    skipped.sort();

    Rebuild {
        owned,
        standing: standing.map(|(_, s)| s),
        skipped,
    }
}
