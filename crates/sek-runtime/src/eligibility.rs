//! Introductory-offer eligibility cache.
//!
//! Populated once per catalog load, read-only to everyone else. A failed
//! eligibility query falls back to eligible — the demo's optimistic policy;
//! the fallback is logged so it stays observable.

use std::collections::BTreeMap;
use std::sync::RwLock;

use sek_schemas::{ProductDescriptor, ProductKind};
use sek_store::CatalogProvider;
use tracing::warn;

pub struct EligibilityCache {
    map: RwLock<BTreeMap<String, bool>>,
}

impl Default for EligibilityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EligibilityCache {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(BTreeMap::new()),
        }
    }

    /// Eligibility for `product_id`. `None` when the product carries no
    /// introductory offer or the cache has not been refreshed yet.
    pub fn get(&self, product_id: &str) -> Option<bool> {
        self.map
            .read()
            .expect("eligibility lock poisoned")
            .get(product_id)
            .copied()
    }

    /// Query eligibility for every subscription product that carries an
    /// introductory offer, replacing the cache contents.
    pub async fn refresh(&self, catalog: &dyn CatalogProvider, products: &[ProductDescriptor]) {
        let mut fresh = BTreeMap::new();
        for product in products {
            if product.kind != ProductKind::AutoRenewable || product.introductory_offer.is_none() {
                continue;
            }
            let eligible = match catalog.is_intro_offer_eligible(&product.id).await {
                Ok(eligible) => eligible,
                Err(e) => {
                    warn!(
                        product_id = %product.id,
                        error = %e,
                        "eligibility query failed; defaulting to eligible"
                    );
                    true
                }
            };
            fresh.insert(product.id.clone(), eligible);
        }
        *self.map.write().expect("eligibility lock poisoned") = fresh;
    }
}
