//! sek-store
//!
//! Platform-store boundary for the entitlement kit.
//!
//! This crate defines **only** the collaborator traits and their error type.
//! No concrete store implementations, no verification, no reconciliation
//! logic belong here. The runtime holds these as trait objects and never
//! learns which platform is behind them; the deterministic in-memory store
//! lives in `sek-store-mock`.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use sek_schemas::{ProductDescriptor, SignedEnvelope};
use std::fmt;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a store collaborator may return.
///
/// Every variant is retryable from the caller's point of view; none of them
/// is allowed to take the process down. The purchase flow maps these to
/// tagged failure results, bulk reconciliation logs and continues.
#[derive(Debug)]
pub enum StoreError {
    /// Catalog lookup failed (network, unknown ids, malformed response).
    Catalog(String),
    /// The purchase primitive itself failed (distinct from a user cancel,
    /// which is a regular [`PurchaseOutcome`]).
    Purchase(String),
    /// Forced ledger sync failed (network or re-authentication).
    Sync(String),
    /// Introductory-offer eligibility query failed.
    Eligibility(String),
    /// Transport-level failure for any other ledger call.
    Transport(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Catalog(msg) => write!(f, "catalog error: {msg}"),
            StoreError::Purchase(msg) => write!(f, "purchase error: {msg}"),
            StoreError::Sync(msg) => write!(f, "ledger sync error: {msg}"),
            StoreError::Eligibility(msg) => write!(f, "eligibility query error: {msg}"),
            StoreError::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Purchase outcome
// ---------------------------------------------------------------------------

/// Tagged outcome of one invocation of the platform purchase sheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// User approved; the signed envelope still has to pass the gate.
    Approved(SignedEnvelope),
    /// User dismissed the payment sheet. No state may change.
    Cancelled,
    /// Payment deferred (e.g. awaiting parental approval). Resolution
    /// arrives later over the transaction-update stream.
    Pending,
    /// The platform returned a state this kit does not recognize.
    Unknown,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Product catalog service.
///
/// Implementations must be object-safe so callers can hold a
/// `Box<dyn CatalogProvider>`, and `Send + Sync` for use across async task
/// boundaries.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Human-readable name identifying this provider (e.g. `"mock"`).
    fn name(&self) -> &'static str;

    /// Fetch descriptors for `ids`. Unknown ids are omitted, not errors;
    /// callers decide whether a short result matters.
    async fn fetch_products(&self, ids: &[String]) -> Result<Vec<ProductDescriptor>, StoreError>;

    /// Whether this user is still eligible for the product's introductory
    /// offer.
    async fn is_intro_offer_eligible(&self, product_id: &str) -> Result<bool, StoreError>;
}

// ---------------------------------------------------------------------------
// Purchase
// ---------------------------------------------------------------------------

/// Platform purchase sheet.
#[async_trait]
pub trait PurchaseProvider: Send + Sync {
    /// Present the payment sheet for `product` and report its tagged outcome.
    ///
    /// An `Err` means the primitive itself failed; a user cancel is the
    /// `Cancelled` outcome, not an error.
    async fn initiate_purchase(
        &self,
        product: &ProductDescriptor,
    ) -> Result<PurchaseOutcome, StoreError>;
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The platform's transaction ledger: a push stream of updates plus a
/// queryable current-entitlements snapshot.
#[async_trait]
pub trait LedgerProvider: Send + Sync {
    /// Subscribe to transaction updates (renewals, refunds, out-of-app
    /// purchases, deferred-purchase resolutions). Unbounded lifetime; the
    /// stream ends only when the store shuts down.
    fn transaction_updates(&self) -> BoxStream<'static, SignedEnvelope>;

    /// The full current-entitlements view. Finite per call; authoritative
    /// for non-consumable ownership at the moment it was read.
    async fn current_entitlements(&self) -> Result<Vec<SignedEnvelope>, StoreError>;

    /// Acknowledge (finish) a transaction so the ledger stops redelivering
    /// it. Idempotent: acknowledging twice is harmless.
    async fn acknowledge(&self, transaction_id: &str) -> Result<(), StoreError>;

    /// Force a refresh against the remote ledger (may prompt
    /// re-authentication upstream).
    async fn sync_with_remote(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
