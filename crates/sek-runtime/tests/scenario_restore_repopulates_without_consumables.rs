//! Scenario: restore repopulates entitlements, never coins
//!
//! # Invariant under test
//!
//! After a reinstall the ledger still knows about standing entitlements
//! (lifetime unlock, live subscription) but consumables are gone for good:
//! restore rebuilds the owned set from the current-entitlements view and the
//! coin balance stays where local state says it is (zero on a fresh
//! install). A failed forced sync surfaces as a tagged failure.

use std::sync::Arc;

use sek_runtime::{EntitlementManager, FlowResult};
use sek_store_mock::MockStore;
use sek_verify::EnvelopeGate;

const SECRET: &str = "scenario-secret";

fn manager_for(store: &Arc<MockStore>) -> Arc<EntitlementManager> {
    let clock_store = store.clone();
    Arc::new(
        EntitlementManager::new(
            EnvelopeGate::shared_secret(SECRET),
            store.clone(),
            store.clone(),
            store.clone(),
        )
        .with_clock(Arc::new(move || clock_store.now_ms())),
    )
}

fn seeded_store() -> Arc<MockStore> {
    let store = Arc::new(MockStore::new(SECRET));
    store.inject_entitlement(sek_schemas::TransactionPayload {
        transaction_id: "mock:txn:lifetime".to_string(),
        product_id: "lifetime.unlock".to_string(),
        kind: sek_schemas::ProductKind::NonConsumable,
        purchased_at_ms: 500_000,
        revocation_at_ms: None,
        is_upgraded: false,
        subscription: None,
    });
    store.inject_entitlement(sek_schemas::TransactionPayload {
        transaction_id: "mock:txn:sub".to_string(),
        product_id: "premium.yearly".to_string(),
        kind: sek_schemas::ProductKind::AutoRenewable,
        purchased_at_ms: 600_000,
        revocation_at_ms: None,
        is_upgraded: false,
        subscription: Some(sek_schemas::SubscriptionInfo {
            group_id: "premium".to_string(),
            renewal_state: sek_schemas::RenewalState::Subscribed,
            auto_renew_enabled: false,
        }),
    });
    store
}

#[tokio::test]
async fn restore_recovers_standing_entitlements_only() {
    let store = seeded_store();
    // Fresh install: empty local state.
    let manager = manager_for(&store);
    assert!(manager.snapshot().owned.is_empty());

    let result = manager.restore_purchases().await;
    assert!(result.is_success(), "got: {result:?}");

    let snapshot = manager.snapshot();
    assert!(snapshot.owns("lifetime.unlock"));
    assert!(snapshot.owns("premium.yearly"));
    assert_eq!(
        snapshot.coin_balance, 0,
        "consumables are never re-granted by restore"
    );
    assert_eq!(
        snapshot.subscription_status,
        "Subscribed - auto-renew off",
        "status derives from the restored subscription entry"
    );
}

#[tokio::test]
async fn failed_sync_is_a_tagged_failure_and_keeps_prior_state() {
    let store = seeded_store();
    let manager = manager_for(&store);
    manager.refresh_from_ledger().await.unwrap();
    let before = manager.snapshot();

    store.set_sync_fails(true);
    let result = manager.restore_purchases().await;

    match result {
        FlowResult::Failure(msg) => {
            assert!(msg.contains("re-authentication"), "got: {msg}")
        }
        other => panic!("expected Failure, got {other:?}"),
    }
    assert_eq!(
        manager.snapshot(),
        before,
        "a failed restore must leave the published snapshot untouched"
    );
}
