//! sek-reconcile
//!
//! Entitlement reconciliation rules.
//!
//! Architectural decisions:
//! - Non-consumable entitlements are always rebuilt from the ledger's full
//!   current-entitlements view, never patched incrementally. A fresh set per
//!   pass is what enforces one-tier-per-subscription-group and drops stale
//!   entries without bookkeeping.
//! - Consumables are granted exactly once per transaction id via the push
//!   path and never appear in the rebuilt set.
//! - Upgraded and revoked entries are filtered, with skip evidence reported
//!   to the caller for logging.
//!
//! Pure deterministic logic. No IO, no wall-clock; the caller provides
//! `now_ms`. Same inputs always produce the same outputs, which is what makes
//! concurrent reconciliation passes commute.

mod classify;
mod coins;
mod engine;
mod status;
mod types;

pub use classify::{disposition, is_revoked, Disposition};
pub use coins::{CoinLedger, GrantOutcome, COIN_GRANT_AMOUNT};
pub use engine::rebuild;
pub use status::{status_text, NEUTRAL_STATUS};
pub use types::*;
