//! sek-runtime
//!
//! Async owner of all mutable entitlement state.
//!
//! Architectural decisions:
//! - One [`EntitlementManager`] instance owns the coin balance, the owned
//!   set, and the subscription status line. Every mutation path funnels
//!   through it; there are no globals. Construct it once and hand out
//!   `Arc` handles.
//! - Readers never touch the owned state: they receive immutable
//!   [`EntitlementSnapshot`] values over a watch channel.
//! - Reconciliation passes are serialized through a single-flight lock, so
//!   the published state always derives from the most recently read ledger
//!   view ("last read wins" — an older read can never overwrite a newer one).
//! - The transaction listener is a supervised task: it owns a shutdown
//!   signal and is joined at teardown, never detached.

mod eligibility;
mod flow;
mod listener;
mod manager;

pub use eligibility::EligibilityCache;
pub use flow::FlowResult;
pub use listener::{spawn_transaction_listener, ListenerHandle};
pub use manager::{EntitlementManager, EntitlementSnapshot, NowFn};
