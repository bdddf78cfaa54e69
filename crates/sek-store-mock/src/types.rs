//! Scripting knobs for the mock store.

/// What the next `initiate_purchase` call for a product should do.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum PurchaseScript {
    /// Approve with a well-signed envelope and record the grant in the
    /// ledger (non-consumables only; consumables are push-path grants).
    #[default]
    Approve,
    /// Approve but return an envelope whose signature will not verify.
    /// Exercises the gate on the purchase path.
    ApproveTampered,
    /// User dismissed the payment sheet.
    Cancel,
    /// Payment deferred; resolution arrives later over the update stream.
    Defer,
    /// The platform returned an unrecognized state.
    Unknown,
    /// The purchase primitive itself errors.
    Fail(String),
}

/// What the eligibility query for a product should report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EligibilityScript {
    #[default]
    Eligible,
    Ineligible,
    QueryFails,
}
