//! Purchase and restore flows.
//!
//! Every user-initiated action resolves to exactly one [`FlowResult`]; store
//! errors are caught at this boundary and become tagged failures, never
//! panics or propagated errors.

use sek_schemas::ProductDescriptor;
use sek_store::PurchaseOutcome;
use tracing::warn;

use crate::manager::EntitlementManager;

/// Tagged result of one purchase or restore attempt. The message is
/// human-readable and safe to surface directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowResult {
    Success(String),
    Cancelled(String),
    Pending(String),
    Failure(String),
}

impl FlowResult {
    pub fn is_success(&self) -> bool {
        matches!(self, FlowResult::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            FlowResult::Success(msg)
            | FlowResult::Cancelled(msg)
            | FlowResult::Pending(msg)
            | FlowResult::Failure(msg) => msg,
        }
    }
}

impl EntitlementManager {
    /// Drive one purchase attempt end-to-end: invoke the payment sheet,
    /// verify the result, reconcile, then acknowledge.
    ///
    /// Acknowledge comes strictly after reconciliation: a crash in between
    /// leaves the transaction un-acknowledged, and the ledger redelivers it
    /// on next launch instead of silently losing the grant.
    pub async fn purchase(&self, product: &ProductDescriptor) -> FlowResult {
        let outcome = match self.purchases().initiate_purchase(product).await {
            Ok(outcome) => outcome,
            Err(e) => return FlowResult::Failure(format!("purchase failed: {e}")),
        };

        match outcome {
            PurchaseOutcome::Approved(envelope) => {
                let tx = match self.gate().verify(&envelope) {
                    Ok(tx) => tx,
                    Err(e) => {
                        return FlowResult::Failure(format!(
                            "transaction could not be verified: {e}"
                        ))
                    }
                };
                if let Err(e) = self.apply_transaction(&tx).await {
                    // Not acknowledged: the ledger will redeliver, and the
                    // next reconciliation pass picks the grant up.
                    return FlowResult::Failure(format!(
                        "purchase approved but entitlements could not be refreshed: {e}"
                    ));
                }
                if let Err(e) = self.ledger().acknowledge(tx.transaction_id()).await {
                    warn!(transaction_id = tx.transaction_id(), error = %e, "acknowledge failed");
                }
                FlowResult::Success(format!("Purchase complete: {}", product.display_name))
            }
            PurchaseOutcome::Cancelled => {
                FlowResult::Cancelled("Purchase cancelled".to_string())
            }
            PurchaseOutcome::Pending => FlowResult::Pending(
                "Purchase pending approval; it will complete automatically".to_string(),
            ),
            PurchaseOutcome::Unknown => FlowResult::Failure("unknown purchase state".to_string()),
        }
    }

    /// Force a ledger sync and re-reconcile. Used by an explicit "restore
    /// purchases" affordance (reinstall, new device).
    pub async fn restore_purchases(&self) -> FlowResult {
        if let Err(e) = self.ledger().sync_with_remote().await {
            return FlowResult::Failure(format!("restore failed: {e}"));
        }
        match self.refresh_from_ledger().await {
            Ok(()) => FlowResult::Success("Purchases restored".to_string()),
            Err(e) => FlowResult::Failure(format!("restore failed: {e}")),
        }
    }
}
