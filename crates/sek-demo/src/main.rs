//! sek-demo entry point.
//!
//! This file is intentionally thin: it sets up tracing, seeds the in-memory
//! mock store with the demo storefront, and walks the purchase/restore flows
//! against one `EntitlementManager`. All entitlement logic lives in
//! `sek-runtime`; the walkthrough here only drives it and prints snapshots.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sek_runtime::{spawn_transaction_listener, EntitlementManager};
use sek_schemas::{IntroductoryOffer, ProductDescriptor};
use sek_store_mock::MockStore;
use sek_verify::EnvelopeGate;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "sek-demo")]
#[command(about = "Storefront entitlement walkthrough against the in-memory mock store")]
struct Cli {
    /// Simulate a refund of the lifetime unlock arriving over the
    /// transaction stream after the purchases.
    #[arg(long)]
    refund: bool,

    /// Exercise the restore flow at the end of the walkthrough.
    #[arg(long)]
    restore: bool,
}

fn storefront_ids() -> Vec<String> {
    [
        "coins.pack.small",
        "lifetime.unlock",
        "premium.monthly",
        "premium.yearly",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn seed_catalog(store: &MockStore) {
    store.add_product(ProductDescriptor::consumable(
        "coins.pack.small",
        "Coin Pack",
        990_000,
        "$0.99",
    ));
    store.add_product(ProductDescriptor::non_consumable(
        "lifetime.unlock",
        "Lifetime Unlock",
        29_990_000,
        "$29.99",
    ));
    store.add_product(
        ProductDescriptor::auto_renewable(
            "premium.monthly",
            "Premium (Monthly)",
            4_990_000,
            "$4.99",
            "premium",
        )
        .with_introductory_offer(IntroductoryOffer {
            display_price: "Free".to_string(),
            price_micros: 0,
            period_days: 7,
        }),
    );
    store.add_product(
        ProductDescriptor::auto_renewable(
            "premium.yearly",
            "Premium (Yearly)",
            49_990_000,
            "$49.99",
            "premium",
        )
        .with_introductory_offer(IntroductoryOffer {
            display_price: "Free".to_string(),
            price_micros: 0,
            period_days: 14,
        }),
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    let session_id = Uuid::new_v4();
    info!(%session_id, "storefront demo starting");

    let secret =
        std::env::var("SEK_STORE_SECRET").unwrap_or_else(|_| "demo-secret".to_string());
    let store = Arc::new(MockStore::new(secret.clone()));
    seed_catalog(&store);

    let clock_store = store.clone();
    let manager = Arc::new(
        EntitlementManager::new(
            EnvelopeGate::shared_secret(secret),
            store.clone(),
            store.clone(),
            store.clone(),
        )
        .with_clock(Arc::new(move || clock_store.now_ms())),
    );

    let listener = spawn_transaction_listener(manager.clone());

    let products = manager
        .load_products(&storefront_ids())
        .await
        .context("catalog load failed")?;
    for product in &products {
        info!(
            id = %product.id,
            price = %product.display_price,
            eligible = ?manager.intro_offer_eligible(&product.id),
            "product"
        );
    }

    for product_id in ["coins.pack.small", "lifetime.unlock", "premium.monthly"] {
        let product = manager
            .product(product_id)
            .context("product missing from loaded catalog")?;
        let result = manager.purchase(&product).await;
        info!(id = %product.id, ?result, "purchase attempt");
    }

    // Upgrade: buying the yearly tier supersedes the live monthly tier.
    let yearly = manager
        .product("premium.yearly")
        .context("product missing from loaded catalog")?;
    let result = manager.purchase(&yearly).await;
    info!(id = %yearly.id, ?result, "upgrade attempt");
    info!(snapshot = ?manager.snapshot(), "after purchases");

    if cli.refund {
        if let Some(mut entry) = store.ledger_entry_for("lifetime.unlock") {
            store.revoke(&entry.transaction_id, store.now_ms());
            entry.revocation_at_ms = Some(store.now_ms());
            store.push_update(&entry);

            let mut rx = manager.subscribe();
            tokio::time::timeout(
                Duration::from_secs(5),
                rx.wait_for(|snap| !snap.owns("lifetime.unlock")),
            )
            .await
            .context("refund was not applied in time")?
            .context("snapshot channel closed")?;
            info!(snapshot = ?manager.snapshot(), "after refund");
        }
    }

    if cli.restore {
        let result = manager.restore_purchases().await;
        info!(?result, snapshot = ?manager.snapshot(), "after restore");
    }

    listener.shutdown().await;
    info!("storefront demo finished");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
