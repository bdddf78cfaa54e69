//! Scenario: consumable purchase grants coins exactly once
//!
//! # Invariant under test
//!
//! A consumable purchase credits the coin balance by one grant per distinct
//! transaction id, no matter how many times the ledger redelivers the same
//! transaction over the update stream. Consumables never touch the
//! entitlement set.

use std::sync::Arc;
use std::time::Duration;

use sek_runtime::{spawn_transaction_listener, EntitlementManager};
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

fn coin_product() -> sek_schemas::ProductDescriptor {
    sek_schemas::ProductDescriptor::consumable("coins.pack.small", "Coin Pack", 990_000, "$0.99")
}

#[tokio::test]
async fn purchase_credits_one_grant_and_leaves_entitlements_alone() {
    let store = Arc::new(MockStore::new(SECRET));
    store.add_product(coin_product());
    let manager = manager_for(&store);

    let result = manager.purchase(&coin_product()).await;
    assert!(result.is_success(), "got: {result:?}");

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.coin_balance, 100, "one purchase, one grant");
    assert!(
        snapshot.owned.is_empty(),
        "consumables must not create standing entitlements"
    );
    assert!(
        store.acknowledged().contains("mock:txn:1"),
        "approved transaction must be acknowledged after reconciliation"
    );
}

#[tokio::test]
async fn redelivered_transaction_does_not_grant_twice() {
    let store = Arc::new(MockStore::new(SECRET));
    store.add_product(coin_product());
    let manager = manager_for(&store);
    let listener = spawn_transaction_listener(manager.clone());

    let result = manager.purchase(&coin_product()).await;
    assert!(result.is_success(), "got: {result:?}");
    assert_eq!(manager.snapshot().coin_balance, 100);

    // The ledger redelivers the same transaction (e.g. the acknowledge was
    // lost). Same id, same envelope — must be a no-op.
    let payload = sek_schemas::TransactionPayload {
        transaction_id: "mock:txn:1".to_string(),
        product_id: "coins.pack.small".to_string(),
        kind: sek_schemas::ProductKind::Consumable,
        purchased_at_ms: store.now_ms(),
        revocation_at_ms: None,
        is_upgraded: false,
        subscription: None,
    };
    store.push_update(&payload);

    // A second, distinct consumable proves the stream drained past the replay.
    let fresh = sek_schemas::TransactionPayload {
        transaction_id: "mock:txn:fresh".to_string(),
        ..payload.clone()
    };
    store.push_update(&fresh);

    let mut rx = manager.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|snap| snap.coin_balance == 200),
    )
    .await
    .expect("listener applies the fresh grant within the timeout")
    .expect("snapshot channel stays open");

    assert_eq!(
        manager.snapshot().coin_balance,
        200,
        "replay must not credit a third grant: 100 (purchase) + 100 (fresh)"
    );

    listener.shutdown().await;
}
