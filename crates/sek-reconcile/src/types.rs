use std::collections::BTreeSet;

use sek_schemas::RenewalState;
use serde::{Deserialize, Serialize};

/// Why an entry was excluded from a rebuild pass. Stable ordering enforced by
/// the engine so reports are deterministic.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Superseded by a higher-priority tier in the same subscription group.
    Upgraded,
    /// Revocation timestamp set and at or before the pass's `now_ms`.
    Revoked,
    /// Consumables are not standing entitlements; the ledger's entitlement
    /// view should never contain one, but one that sneaks in is ignored.
    ConsumableInLedger,
}

/// Evidence for one excluded entry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub transaction_id: String,
    pub product_id: String,
    pub reason: SkipReason,
}

/// Renewal standing of the surviving auto-renewable entry, used to derive
/// the subscription status line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStanding {
    pub product_id: String,
    pub renewal_state: RenewalState,
    pub auto_renew_enabled: bool,
}

/// Result of one rebuild pass over the ledger's current entitlements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rebuild {
    /// Product ids owned after this pass. Built from scratch, never merged
    /// with the previous set.
    pub owned: BTreeSet<String>,
    /// Standing of the surviving subscription, if any survived filtering.
    pub standing: Option<SubscriptionStanding>,
    /// Entries excluded by filtering, in stable order.
    pub skipped: Vec<SkippedEntry>,
}

impl Rebuild {
    pub fn empty() -> Self {
        Self {
            owned: BTreeSet::new(),
            standing: None,
            skipped: Vec::new(),
        }
    }

    pub fn owns(&self, product_id: &str) -> bool {
        self.owned.contains(product_id)
    }
}
