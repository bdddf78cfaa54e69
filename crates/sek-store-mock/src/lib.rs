//! Deterministic in-memory platform store.
//!
//! Design decisions (kept intentionally simple/deterministic):
//! - Transaction ids are sequence-derived: `"mock:txn:{seq}"`.
//! - Purchase timestamps come from an internal logical clock that ticks by
//!   1000 ms per minted transaction; tests can advance it explicitly.
//! - Envelopes are signed with the shared-secret scheme `sek-verify` checks.
//! - No randomness. No wall clock.
//! - Purchases, eligibility queries, and sync can be scripted per product to
//!   exercise every branch of the runtime.
//!
//! An approved non-consumable or subscription purchase is recorded in the
//! ledger's current-entitlements view, the way the real platform records it;
//! buying a tier while a sibling tier in the same group is live marks the
//! sibling's transaction upgraded. Consumable approvals are never recorded —
//! they exist only as the returned envelope (and whatever the test replays
//! over the update stream).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use sek_schemas::{ProductDescriptor, ProductKind, SignedEnvelope, TransactionPayload};
use sek_store::{CatalogProvider, LedgerProvider, PurchaseOutcome, PurchaseProvider, StoreError};
use sek_verify::SharedSecretVerifier;

mod types;

pub use types::{EligibilityScript, PurchaseScript};

/// Capacity of the update broadcast channel. Scenario tests push a handful of
/// events; lagging receivers are a test bug, not a runtime condition.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

struct Inner {
    catalog: BTreeMap<String, ProductDescriptor>,
    /// Current-entitlements view, keyed by transaction id.
    entitlements: BTreeMap<String, TransactionPayload>,
    /// Entries served with a bad signature, for partial-failure scenarios.
    corrupt_entitlements: Vec<TransactionPayload>,
    purchase_scripts: BTreeMap<String, PurchaseScript>,
    eligibility_scripts: BTreeMap<String, EligibilityScript>,
    acknowledged: BTreeSet<String>,
    sync_fails: bool,
    clock_ms: i64,
    next_txn_seq: u64,
}

pub struct MockStore {
    signer: SharedSecretVerifier,
    inner: Mutex<Inner>,
    updates_tx: broadcast::Sender<SignedEnvelope>,
}

impl MockStore {
    pub fn new(secret: impl Into<String>) -> Self {
        let (updates_tx, _rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            signer: SharedSecretVerifier::new(secret),
            inner: Mutex::new(Inner {
                catalog: BTreeMap::new(),
                entitlements: BTreeMap::new(),
                corrupt_entitlements: Vec::new(),
                purchase_scripts: BTreeMap::new(),
                eligibility_scripts: BTreeMap::new(),
                acknowledged: BTreeSet::new(),
                sync_fails: false,
                clock_ms: 1_000_000,
                next_txn_seq: 1,
            }),
            updates_tx,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("mock store mutex poisoned")
    }

    /// Sign `payload` into the envelope shape the gate accepts.
    pub fn sign(&self, payload: &TransactionPayload) -> SignedEnvelope {
        let payload_json = payload.to_json().expect("payload serializes");
        SignedEnvelope {
            signature: self.signer.sign(&payload_json),
            payload_json,
        }
    }

    // -- catalog setup ------------------------------------------------------

    pub fn add_product(&self, product: ProductDescriptor) {
        self.lock().catalog.insert(product.id.clone(), product);
    }

    pub fn script_purchase(&self, product_id: impl Into<String>, script: PurchaseScript) {
        self.lock().purchase_scripts.insert(product_id.into(), script);
    }

    pub fn script_eligibility(&self, product_id: impl Into<String>, script: EligibilityScript) {
        self.lock()
            .eligibility_scripts
            .insert(product_id.into(), script);
    }

    pub fn set_sync_fails(&self, fails: bool) {
        self.lock().sync_fails = fails;
    }

    // -- ledger manipulation (test/demo wiring) -----------------------------

    /// Advance the logical clock.
    pub fn advance_clock_ms(&self, delta_ms: i64) {
        self.lock().clock_ms += delta_ms;
    }

    pub fn now_ms(&self) -> i64 {
        self.lock().clock_ms
    }

    /// Place an entry directly into the current-entitlements view.
    pub fn inject_entitlement(&self, payload: TransactionPayload) {
        self.lock()
            .entitlements
            .insert(payload.transaction_id.clone(), payload);
    }

    /// Place an entry in the view that will be served with a signature the
    /// gate rejects.
    pub fn inject_corrupt_entitlement(&self, payload: TransactionPayload) {
        self.lock().corrupt_entitlements.push(payload);
    }

    /// Mark an existing entry revoked as of `at_ms`.
    pub fn revoke(&self, transaction_id: &str, at_ms: i64) {
        if let Some(entry) = self.lock().entitlements.get_mut(transaction_id) {
            entry.revocation_at_ms = Some(at_ms);
        }
    }

    /// Remove an entry entirely (subscription lapsed off the view).
    pub fn drop_entitlement(&self, transaction_id: &str) {
        self.lock().entitlements.remove(transaction_id);
    }

    /// Push a well-signed envelope for `payload` over the update stream.
    pub fn push_update(&self, payload: &TransactionPayload) {
        let _ = self.updates_tx.send(self.sign(payload));
    }

    /// Push an envelope whose signature will not verify.
    pub fn push_corrupt_update(&self, payload: &TransactionPayload) {
        let payload_json = payload.to_json().expect("payload serializes");
        let _ = self.updates_tx.send(SignedEnvelope {
            payload_json,
            signature: "forged".to_string(),
        });
    }

    /// Transaction ids acknowledged so far (for assertions).
    pub fn acknowledged(&self) -> BTreeSet<String> {
        self.lock().acknowledged.clone()
    }

    /// The current-entitlements payload recorded for `product_id`, if any.
    pub fn ledger_entry_for(&self, product_id: &str) -> Option<TransactionPayload> {
        self.lock()
            .entitlements
            .values()
            .find(|p| p.product_id == product_id)
            .cloned()
    }

    // -- internal -----------------------------------------------------------

    /// Mint the payload for an approved purchase and, for standing
    /// entitlements, record it in the ledger view (upgrading siblings in the
    /// same subscription group).
    fn mint_purchase(&self, product: &ProductDescriptor) -> TransactionPayload {
        let mut inner = self.lock();
        inner.clock_ms += 1_000;
        let seq = inner.next_txn_seq;
        inner.next_txn_seq += 1;

        let payload = TransactionPayload {
            transaction_id: format!("mock:txn:{seq}"),
            product_id: product.id.clone(),
            kind: product.kind,
            purchased_at_ms: inner.clock_ms,
            revocation_at_ms: None,
            is_upgraded: false,
            subscription: product.subscription_group_id.as_ref().map(|group_id| {
                sek_schemas::SubscriptionInfo {
                    group_id: group_id.clone(),
                    renewal_state: sek_schemas::RenewalState::Subscribed,
                    auto_renew_enabled: true,
                }
            }),
        };

        if product.kind != ProductKind::Consumable {
            if let Some(group_id) = product.subscription_group_id.as_deref() {
                for entry in inner.entitlements.values_mut() {
                    let same_group = entry
                        .subscription
                        .as_ref()
                        .is_some_and(|s| s.group_id == group_id);
                    if same_group && entry.revocation_at_ms.is_none() {
                        entry.is_upgraded = true;
                    }
                }
            }
            inner
                .entitlements
                .insert(payload.transaction_id.clone(), payload.clone());
        }

        payload
    }
}

// ---------------------------------------------------------------------------
// CatalogProvider
// ---------------------------------------------------------------------------

#[async_trait]
impl CatalogProvider for MockStore {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_products(&self, ids: &[String]) -> Result<Vec<ProductDescriptor>, StoreError> {
        let inner = self.lock();
        // Deterministic: catalog (BTreeMap) order, filtered to the request.
        Ok(inner
            .catalog
            .values()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn is_intro_offer_eligible(&self, product_id: &str) -> Result<bool, StoreError> {
        let script = self
            .lock()
            .eligibility_scripts
            .get(product_id)
            .copied()
            .unwrap_or_default();
        match script {
            EligibilityScript::Eligible => Ok(true),
            EligibilityScript::Ineligible => Ok(false),
            EligibilityScript::QueryFails => Err(StoreError::Eligibility(format!(
                "eligibility unavailable for {product_id}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// PurchaseProvider
// ---------------------------------------------------------------------------

#[async_trait]
impl PurchaseProvider for MockStore {
    async fn initiate_purchase(
        &self,
        product: &ProductDescriptor,
    ) -> Result<PurchaseOutcome, StoreError> {
        let script = self
            .lock()
            .purchase_scripts
            .get(&product.id)
            .cloned()
            .unwrap_or_default();

        match script {
            PurchaseScript::Approve => {
                let payload = self.mint_purchase(product);
                Ok(PurchaseOutcome::Approved(self.sign(&payload)))
            }
            PurchaseScript::ApproveTampered => {
                let payload = self.mint_purchase(product);
                let payload_json = payload.to_json().expect("payload serializes");
                Ok(PurchaseOutcome::Approved(SignedEnvelope {
                    payload_json,
                    signature: "forged".to_string(),
                }))
            }
            PurchaseScript::Cancel => Ok(PurchaseOutcome::Cancelled),
            PurchaseScript::Defer => Ok(PurchaseOutcome::Pending),
            PurchaseScript::Unknown => Ok(PurchaseOutcome::Unknown),
            PurchaseScript::Fail(msg) => Err(StoreError::Purchase(msg)),
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerProvider
// ---------------------------------------------------------------------------

#[async_trait]
impl LedgerProvider for MockStore {
    fn transaction_updates(&self) -> BoxStream<'static, SignedEnvelope> {
        let rx = self.updates_tx.subscribe();
        BroadcastStream::new(rx)
            .filter_map(|item| async move { item.ok() })
            .boxed()
    }

    async fn current_entitlements(&self) -> Result<Vec<SignedEnvelope>, StoreError> {
        let (entries, corrupt) = {
            let inner = self.lock();
            (
                inner.entitlements.values().cloned().collect::<Vec<_>>(),
                inner.corrupt_entitlements.clone(),
            )
        };
        let mut envelopes: Vec<SignedEnvelope> = entries.iter().map(|p| self.sign(p)).collect();
        envelopes.extend(corrupt.iter().map(|p| SignedEnvelope {
            payload_json: p.to_json().expect("payload serializes"),
            signature: "forged".to_string(),
        }));
        Ok(envelopes)
    }

    async fn acknowledge(&self, transaction_id: &str) -> Result<(), StoreError> {
        // Idempotent: re-acknowledging is a no-op.
        self.lock().acknowledged.insert(transaction_id.to_string());
        Ok(())
    }

    async fn sync_with_remote(&self) -> Result<(), StoreError> {
        if self.lock().sync_fails {
            return Err(StoreError::Sync("re-authentication required".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
