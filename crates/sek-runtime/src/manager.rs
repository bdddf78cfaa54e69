//! Entitlement manager: state ownership, transaction application, and the
//! ledger reconciliation driver.

use std::collections::BTreeSet;
use std::sync::Arc;

use sek_reconcile::{
    disposition, rebuild, status_text, CoinLedger, Disposition, GrantOutcome, NEUTRAL_STATUS,
};
use sek_schemas::{ProductDescriptor, SignedEnvelope};
use sek_store::{CatalogProvider, LedgerProvider, PurchaseProvider, StoreError};
use sek_verify::{EnvelopeGate, VerifiedTransaction};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::eligibility::EligibilityCache;

/// Clock source for revocation checks. Defaults to wall clock; tests and the
/// demo supply the mock store's logical clock so passes are deterministic.
pub type NowFn = Arc<dyn Fn() -> i64 + Send + Sync>;

fn wall_clock() -> NowFn {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

// ---------------------------------------------------------------------------
// Published snapshot
// ---------------------------------------------------------------------------

/// Immutable point-in-time view of entitlement state, published over a watch
/// channel after every mutation. This is the only thing readers see.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntitlementSnapshot {
    /// Currently-owned non-consumable and subscription product ids.
    pub owned: BTreeSet<String>,
    /// Coin balance from consumable grants.
    pub coin_balance: i64,
    /// Subscription status display line.
    pub subscription_status: String,
}

impl EntitlementSnapshot {
    pub fn empty() -> Self {
        Self {
            owned: BTreeSet::new(),
            coin_balance: 0,
            subscription_status: NEUTRAL_STATUS.to_string(),
        }
    }

    pub fn owns(&self, product_id: &str) -> bool {
        self.owned.contains(product_id)
    }
}

/// State owned exclusively by the manager. All access goes through the
/// manager's mutex; nothing else may hold a reference to this.
struct OwnedState {
    coins: CoinLedger,
    owned: BTreeSet<String>,
    subscription_status: String,
}

impl OwnedState {
    fn snapshot(&self) -> EntitlementSnapshot {
        EntitlementSnapshot {
            owned: self.owned.clone(),
            coin_balance: self.coins.balance(),
            subscription_status: self.subscription_status.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

pub struct EntitlementManager {
    gate: EnvelopeGate,
    catalog: Arc<dyn CatalogProvider>,
    purchases: Arc<dyn PurchaseProvider>,
    ledger: Arc<dyn LedgerProvider>,
    now: NowFn,

    /// Single writer for all entitlement state.
    state: Mutex<OwnedState>,
    /// Single-flight lock for reconciliation passes: fetch and publish happen
    /// under this lock, so passes apply strictly in read order.
    refresh_gate: Mutex<()>,
    /// Published snapshots. `watch` keeps only the latest value, which is
    /// exactly the replace-whole semantics the snapshot has.
    snapshot_tx: watch::Sender<EntitlementSnapshot>,

    /// Catalog as of the last successful load, sorted ascending by price.
    /// Replaced whole, never partially mutated.
    products: std::sync::RwLock<Vec<ProductDescriptor>>,
    eligibility: EligibilityCache,
}

impl EntitlementManager {
    pub fn new(
        gate: EnvelopeGate,
        catalog: Arc<dyn CatalogProvider>,
        purchases: Arc<dyn PurchaseProvider>,
        ledger: Arc<dyn LedgerProvider>,
    ) -> Self {
        let (snapshot_tx, _rx) = watch::channel(EntitlementSnapshot::empty());
        Self {
            gate,
            catalog,
            purchases,
            ledger,
            now: wall_clock(),
            state: Mutex::new(OwnedState {
                coins: CoinLedger::new(),
                owned: BTreeSet::new(),
                subscription_status: NEUTRAL_STATUS.to_string(),
            }),
            refresh_gate: Mutex::new(()),
            snapshot_tx,
            products: std::sync::RwLock::new(Vec::new()),
            eligibility: EligibilityCache::new(),
        }
    }

    /// Replace the clock source (tests, demo with a logical clock).
    pub fn with_clock(mut self, now: NowFn) -> Self {
        self.now = now;
        self
    }

    pub(crate) fn gate(&self) -> &EnvelopeGate {
        &self.gate
    }

    pub(crate) fn purchases(&self) -> &dyn PurchaseProvider {
        self.purchases.as_ref()
    }

    pub(crate) fn ledger(&self) -> &dyn LedgerProvider {
        self.ledger.as_ref()
    }

    // -- published views ----------------------------------------------------

    /// Subscribe to snapshot updates. The receiver always starts with the
    /// current value.
    pub fn subscribe(&self) -> watch::Receiver<EntitlementSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> EntitlementSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Catalog as of the last successful load, ascending by price.
    pub fn products(&self) -> Vec<ProductDescriptor> {
        self.products.read().expect("products lock poisoned").clone()
    }

    pub fn product(&self, product_id: &str) -> Option<ProductDescriptor> {
        self.products()
            .into_iter()
            .find(|p| p.id == product_id)
    }

    /// Introductory-offer eligibility for `product_id`, if known.
    pub fn intro_offer_eligible(&self, product_id: &str) -> Option<bool> {
        self.eligibility.get(product_id)
    }

    // -- catalog ------------------------------------------------------------

    /// Fetch the catalog, refresh eligibility, and run the initial
    /// reconciliation pull. Returns the loaded products sorted ascending by
    /// price. On catalog failure the previous catalog (possibly empty) is
    /// kept and the error is surfaced to the caller — retryable.
    pub async fn load_products(
        &self,
        ids: &[String],
    ) -> Result<Vec<ProductDescriptor>, StoreError> {
        let mut fetched = self.catalog.fetch_products(ids).await?;
        fetched.sort_by(|a, b| {
            a.price_micros
                .cmp(&b.price_micros)
                .then_with(|| a.id.cmp(&b.id))
        });
        info!(count = fetched.len(), "catalog loaded");

        *self.products.write().expect("products lock poisoned") = fetched.clone();

        self.eligibility
            .refresh(self.catalog.as_ref(), &fetched)
            .await;
        self.refresh_from_ledger().await?;

        Ok(fetched)
    }

    // -- transaction application (the one code path) ------------------------

    /// Apply one verified transaction. Both the purchase flow and the
    /// listener funnel through here, so live events and user purchases are
    /// reconciled identically.
    pub async fn apply_transaction(&self, tx: &VerifiedTransaction) -> Result<(), StoreError> {
        match disposition(tx) {
            Disposition::GrantCoins { amount } => {
                let mut state = self.state.lock().await;
                match state.coins.grant(tx.transaction_id(), amount) {
                    GrantOutcome::Granted { new_balance } => {
                        info!(
                            transaction_id = tx.transaction_id(),
                            new_balance, "consumable grant applied"
                        );
                        self.snapshot_tx.send_replace(state.snapshot());
                    }
                    GrantOutcome::Duplicate => {
                        debug!(
                            transaction_id = tx.transaction_id(),
                            "duplicate consumable delivery ignored"
                        );
                    }
                }
                Ok(())
            }
            // A single event cannot disambiguate mutual exclusivity inside a
            // subscription group; only the ledger's current-entitlements view
            // is authoritative for standing entitlements.
            Disposition::RefreshEntitlements => self.refresh_from_ledger().await,
        }
    }

    /// One event from the listener stream: verify, apply, acknowledge.
    ///
    /// Verification failure skips the event. Apply failure leaves the event
    /// un-acknowledged so the ledger redelivers it next session.
    pub async fn handle_ledger_event(&self, envelope: &SignedEnvelope) {
        let tx = match self.gate.verify(envelope) {
            Ok(tx) => tx,
            Err(e) => {
                warn!(error = %e, "skipping unverifiable ledger event");
                return;
            }
        };
        if let Err(e) = self.apply_transaction(&tx).await {
            warn!(
                transaction_id = tx.transaction_id(),
                error = %e,
                "transaction applied with stale entitlements; left un-acknowledged"
            );
            return;
        }
        if let Err(e) = self.ledger.acknowledge(tx.transaction_id()).await {
            // Acknowledge is idempotent; redelivery will retry it.
            warn!(transaction_id = tx.transaction_id(), error = %e, "acknowledge failed");
        }
    }

    // -- reconciliation pull ------------------------------------------------

    /// Rebuild the entitlement set from the ledger's current-entitlements
    /// view and atomically replace the published snapshot.
    ///
    /// Passes are serialized through the single-flight gate: the ledger read
    /// and the snapshot replacement happen under one critical section, so
    /// concurrent triggers (listener event + restore + purchase) apply in
    /// read order and converge on the view read last.
    pub async fn refresh_from_ledger(&self) -> Result<(), StoreError> {
        let _flight = self.refresh_gate.lock().await;

        let envelopes = self.ledger.current_entitlements().await?;

        let mut entries: Vec<VerifiedTransaction> = Vec::with_capacity(envelopes.len());
        for envelope in &envelopes {
            match self.gate.verify(envelope) {
                Ok(tx) => entries.push(tx),
                // One bad entry must not abort the whole pass.
                Err(e) => warn!(error = %e, "skipping unverifiable entitlement entry"),
            }
        }

        let out = rebuild(&entries, (self.now)());
        for skip in &out.skipped {
            debug!(
                transaction_id = %skip.transaction_id,
                product_id = %skip.product_id,
                reason = ?skip.reason,
                "entitlement entry filtered"
            );
        }

        let status = out
            .standing
            .as_ref()
            .map(status_text)
            .unwrap_or_else(|| NEUTRAL_STATUS.to_string());

        let mut state = self.state.lock().await;
        state.owned = out.owned;
        state.subscription_status = status;
        info!(
            owned = state.owned.len(),
            status = %state.subscription_status,
            "entitlements reconciled"
        );
        self.snapshot_tx.send_replace(state.snapshot());
        Ok(())
    }
}
