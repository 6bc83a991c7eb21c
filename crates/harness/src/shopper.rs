use std::sync::Arc;

use cartsync_core::{CartItem, Price, ProductId, ProductSummary, UserId};
use cartsync_engine::{
    CartSnapshot, CartStore, EngineError, IdentityEvent, SyncConfig, SyncOrchestrator, Transition,
};
use cartsync_storage::{LocalCartCache, SqliteCartCache, StorageError};

use crate::FlakyRemote;

/// Deterministic catalog entry for product `id`.
pub fn product(id: i64) -> ProductSummary {
    let cents = u32::try_from(id.rem_euclid(100) * 100 + 99).unwrap_or(99);
    ProductSummary {
        id: ProductId::new(id),
        title: format!("Product {id}"),
        price: Price::from_cents(cents),
        thumbnail: format!("https://cdn.test/products/{id}.png"),
    }
}

/// A single device: its own local cache and cart store, plus an
/// orchestrator wired to the shared remote.
pub struct TestShopper {
    pub cache: Arc<SqliteCartCache>,
    pub store: Arc<CartStore>,
    pub orchestrator: SyncOrchestrator,
}

impl TestShopper {
    pub fn new(remote: Arc<FlakyRemote>, config: SyncConfig) -> Result<Self, StorageError> {
        Ok(Self::with_cache(
            Arc::new(SqliteCartCache::open_in_memory()?),
            remote,
            config,
        ))
    }

    /// Build on an existing cache; the store is restored from whatever it
    /// holds, as on app start.
    pub fn with_cache(
        cache: Arc<SqliteCartCache>,
        remote: Arc<FlakyRemote>,
        config: SyncConfig,
    ) -> Self {
        let store = Arc::new(CartStore::restore(cache.clone()));
        let orchestrator = SyncOrchestrator::new(Arc::clone(&store), cache.clone(), remote, config);
        Self {
            cache,
            store,
            orchestrator,
        }
    }

    /// Add one unit of catalog product `id`.
    pub fn add(&self, id: i64) -> CartSnapshot {
        self.store.add_item(product(id)).next
    }

    pub fn set_quantity(&self, id: i64, quantity: i64) -> CartSnapshot {
        self.store.set_quantity(ProductId::new(id), quantity).next
    }

    pub async fn sign_in(&mut self, user: &UserId) -> Result<Transition, EngineError> {
        self.orchestrator
            .handle(&IdentityEvent::signed_in(user.clone()))
            .await
    }

    pub async fn sign_out(&mut self) -> Result<Transition, EngineError> {
        self.orchestrator.handle(&IdentityEvent::signed_out()).await
    }

    pub fn cart(&self) -> CartSnapshot {
        self.store.snapshot()
    }

    /// `(product id, quantity)` pairs in cart order.
    pub fn quantities(&self) -> Vec<(i64, u32)> {
        quantities(self.cart().items())
    }

    /// `(product id, quantity)` pairs of the local cache value.
    pub fn cached_quantities(&self) -> Vec<(i64, u32)> {
        quantities(&self.cache.read())
    }
}

/// `(product id, quantity)` pairs in row order.
pub fn quantities(items: &[CartItem]) -> Vec<(i64, u32)> {
    items.iter().map(|i| (i.id.get(), i.quantity)).collect()
}
