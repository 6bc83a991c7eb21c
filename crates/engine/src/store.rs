use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cartsync_core::{Cart, ProductId, ProductSummary, merge};
use cartsync_storage::LocalCartCache;
use tracing::{debug, warn};

/// Shared, immutable view of the cart at one point in time.
pub type CartSnapshot = Arc<Cart>;

/// Delivered to subscribers after every mutation.
///
/// For a mutation that changed nothing, `next` is the same allocation as
/// `previous`.
#[derive(Debug, Clone)]
pub struct CartChange {
    pub previous: CartSnapshot,
    pub next: CartSnapshot,
}

impl CartChange {
    pub fn is_noop(&self) -> bool {
        Arc::ptr_eq(&self.previous, &self.next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&CartChange) + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Persist {
    LocalCache,
    Skip,
}

struct StoreState {
    cart: CartSnapshot,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

/// In-memory authoritative cart.
///
/// Every mutation, including one that changed nothing, writes the resulting
/// cart to the local cache and then notifies subscribers, in the order
/// mutations were invoked. Listeners run while the store is locked and must
/// not call back into the store.
pub struct CartStore {
    state: Mutex<StoreState>,
    cache: Arc<dyn LocalCartCache>,
}

impl CartStore {
    /// An empty cart for a fresh guest session.
    pub fn new(cache: Arc<dyn LocalCartCache>) -> Self {
        Self::with_cart(cache, Cart::new())
    }

    /// Rehydrate from whatever the local cache holds. Duplicate rows in the
    /// cached value are collapsed.
    pub fn restore(cache: Arc<dyn LocalCartCache>) -> Self {
        let cart = merge(&cache.read(), &[]);
        debug!(items = cart.len(), "restored cart from local cache");
        Self::with_cart(cache, cart)
    }

    fn with_cart(cache: Arc<dyn LocalCartCache>, cart: Cart) -> Self {
        Self {
            state: Mutex::new(StoreState {
                cart: Arc::new(cart),
                listeners: Vec::new(),
                next_subscription: 0,
            }),
            cache,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // State is only replaced whole, so a poisoned guard is still coherent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> CartSnapshot {
        Arc::clone(&self.lock().cart)
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CartChange) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(sid, _)| *sid != id);
        state.listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().listeners.len()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn add_item(&self, product: ProductSummary) -> CartChange {
        self.apply("add_item", Persist::LocalCache, |cart| cart.add(product))
    }

    pub fn remove_item(&self, id: ProductId) -> CartChange {
        self.apply("remove_item", Persist::LocalCache, |cart| cart.remove(id))
    }

    pub fn set_quantity(&self, id: ProductId, quantity: i64) -> CartChange {
        self.apply("set_quantity", Persist::LocalCache, |cart| {
            cart.set_quantity(id, quantity)
        })
    }

    pub fn clear(&self) -> CartChange {
        self.apply("clear", Persist::LocalCache, Cart::clear)
    }

    /// Install `cart` wholesale. Always counts as a change.
    pub fn replace_all(&self, cart: Cart) -> CartChange {
        self.apply("replace_all", Persist::LocalCache, |current| {
            *current = cart;
            true
        })
    }

    /// Like [`Self::replace_all`] but leaves the local cache untouched.
    pub(crate) fn install(&self, cart: Cart) -> CartChange {
        self.apply("install", Persist::Skip, |current| {
            *current = cart;
            true
        })
    }

    fn apply<F>(&self, op: &'static str, persist: Persist, mutate: F) -> CartChange
    where
        F: FnOnce(&mut Cart) -> bool,
    {
        let mut state = self.lock();
        let previous = Arc::clone(&state.cart);

        let mut draft = Cart::clone(&previous);
        let changed = mutate(&mut draft);
        let next = if changed {
            Arc::new(draft)
        } else {
            Arc::clone(&previous)
        };

        // No-ops too: the cache may have been cleared under an unchanged cart.
        if persist == Persist::LocalCache {
            if let Err(e) = self.cache.write(next.items()) {
                warn!(op, error = %e, "failed to persist cart to local cache");
            }
        }

        if changed {
            state.cart = Arc::clone(&next);
            debug!(op, items = next.len(), "cart mutated");
        } else {
            debug!(op, "cart mutation was a no-op");
        }

        let change = CartChange { previous, next };
        for (_, listener) in &state.listeners {
            listener(&change);
        }
        change
    }
}
