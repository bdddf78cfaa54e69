//! Idempotent consumable grants.
//!
//! The ledger redelivers un-acknowledged transactions (crash between purchase
//! and acknowledge, reinstall, replayed stream), so the transaction id is the
//! idempotency key: one grant per id, ever.

use std::collections::BTreeSet;

/// Coins credited per uniquely-processed consumable transaction.
pub const COIN_GRANT_AMOUNT: i64 = 100;

/// Outcome of one grant attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantOutcome {
    /// First sighting of this transaction id; balance was credited.
    Granted { new_balance: i64 },
    /// Replay of an already-processed transaction id; balance unchanged.
    Duplicate,
}

impl GrantOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, GrantOutcome::Granted { .. })
    }
}

/// Balance plus the set of transaction ids already credited.
///
/// The balance only ever increases, and only through [`CoinLedger::grant`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoinLedger {
    balance: i64,
    granted: BTreeSet<String>,
}

impl CoinLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    /// Credit `amount` for `transaction_id` unless that id was already
    /// credited.
    pub fn grant(&mut self, transaction_id: impl Into<String>, amount: i64) -> GrantOutcome {
        let transaction_id = transaction_id.into();
        if !self.granted.insert(transaction_id) {
            return GrantOutcome::Duplicate;
        }
        self.balance += amount;
        GrantOutcome::Granted {
            new_balance: self.balance,
        }
    }
}
