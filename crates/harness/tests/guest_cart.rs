use std::sync::{Arc, Mutex};

use cartsync_core::ProductId;
use cartsync_engine::{CartStore, SyncConfig};
use cartsync_harness::{TestBackend, TestShopper, init_tracing, product, quantities};
use cartsync_storage::{LocalCartCache, SqliteCartCache};
use rust_decimal::Decimal;

// ============================================================================
// Guest mutations
// ============================================================================

#[tokio::test]
async fn guest_cart_writes_through_to_cache() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut backend = TestBackend::new()?;
    let s = backend.add_shopper(SyncConfig::immediate())?;
    let shopper = backend.shopper(s);

    shopper.add(5);
    shopper.add(5);
    shopper.add(2);
    shopper.set_quantity(2, 4);
    assert_eq!(shopper.quantities(), vec![(5, 2), (2, 4)]);
    assert_eq!(shopper.cached_quantities(), vec![(5, 2), (2, 4)]);

    shopper.store.remove_item(ProductId::new(5));
    assert_eq!(shopper.cached_quantities(), vec![(2, 4)]);

    // No remote traffic while signed out.
    assert_eq!(backend.remote().load_calls(), 0);
    assert_eq!(backend.remote().save_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn cache_holds_json_array_of_rows() -> Result<(), Box<dyn std::error::Error>> {
    let mut backend = TestBackend::new()?;
    let s = backend.add_shopper(SyncConfig::immediate())?;
    let shopper = backend.shopper(s);

    shopper.add(12);
    let raw = shopper.cache.read_raw()?.ok_or("cache slot is empty")?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let rows = value.as_array().ok_or("cached value is not an array")?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], 12);
    assert_eq!(rows[0]["quantity"], 1);
    assert_eq!(rows[0]["title"], "Product 12");
    Ok(())
}

#[tokio::test]
async fn totals_follow_quantities() -> Result<(), Box<dyn std::error::Error>> {
    let mut backend = TestBackend::new()?;
    let s = backend.add_shopper(SyncConfig::immediate())?;
    let shopper = backend.shopper(s);

    shopper.add(1);
    shopper.set_quantity(1, 3);
    let cart = shopper.add(2);

    assert_eq!(cart.total_quantity(), 4);
    let expected = product(1).price.amount() * Decimal::from(3) + product(2).price.amount();
    assert_eq!(cart.subtotal(), expected);
    assert_eq!(cart.subtotal(), Decimal::new(3 * 199 + 299, 2));
    Ok(())
}

#[tokio::test]
async fn subscribers_see_every_mutation_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let mut backend = TestBackend::new()?;
    let s = backend.add_shopper(SyncConfig::immediate())?;
    let shopper = backend.shopper(s);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let id = shopper.store.subscribe(move |change| {
        if let Ok(mut seen) = sink.lock() {
            seen.push((change.is_noop(), quantities(change.next.items())));
        }
    });

    shopper.add(1);
    shopper.set_quantity(1, 1);
    shopper.add(2);
    shopper.store.clear();
    assert!(shopper.store.unsubscribe(id));
    shopper.add(3);

    let seen = seen.lock().map_err(|_| "listener poisoned the lock")?;
    assert_eq!(
        *seen,
        vec![
            (false, vec![(1, 1)]),
            (true, vec![(1, 1)]),
            (false, vec![(1, 1), (2, 1)]),
            (false, vec![]),
        ]
    );
    Ok(())
}

// ============================================================================
// Persistence across restarts
// ============================================================================

#[tokio::test]
async fn guest_cart_survives_restart() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("device.db");
    let path = path.to_str().ok_or("non-utf8 temp path")?;
    let backend = TestBackend::new()?;

    {
        let cache = Arc::new(SqliteCartCache::open(path)?);
        let shopper =
            TestShopper::with_cache(cache, Arc::clone(backend.remote()), SyncConfig::immediate());
        shopper.add(3);
        shopper.add(8);
        shopper.add(3);
    }

    let cache = Arc::new(SqliteCartCache::open(path)?);
    let shopper =
        TestShopper::with_cache(cache, Arc::clone(backend.remote()), SyncConfig::immediate());
    assert_eq!(shopper.quantities(), vec![(3, 2), (8, 1)]);
    Ok(())
}

#[tokio::test]
async fn login_after_restart_merges_restored_cart() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("device.db");
    let path = path.to_str().ok_or("non-utf8 temp path")?;
    let backend = TestBackend::new()?;
    let alice = cartsync_core::UserId::new("alice")?;
    backend
        .remote()
        .seed(&alice, &[cartsync_core::CartItem::new(product(3), 1)])
        .await?;

    {
        let cache = Arc::new(SqliteCartCache::open(path)?);
        cache.write(&[cartsync_core::CartItem::new(product(3), 2)])?;
    }

    let cache = Arc::new(SqliteCartCache::open(path)?);
    let mut shopper =
        TestShopper::with_cache(cache, Arc::clone(backend.remote()), SyncConfig::immediate());
    shopper.sign_in(&alice).await?;

    assert_eq!(shopper.quantities(), vec![(3, 3)]);
    assert_eq!(quantities(&backend.remote().stored(&alice).await?), vec![(3, 3)]);

    let reopened = SqliteCartCache::open(path)?;
    assert!(reopened.read().is_empty());
    Ok(())
}

#[tokio::test]
async fn corrupt_cache_restores_as_empty() -> Result<(), Box<dyn std::error::Error>> {
    let cache = Arc::new(SqliteCartCache::open_in_memory()?);
    cache.write_raw("{not json")?;

    let store = CartStore::restore(cache.clone());
    assert!(store.snapshot().is_empty());

    // The next mutation replaces the unreadable value.
    store.add_item(product(4));
    assert_eq!(quantities(&cache.read()), vec![(4, 1)]);
    Ok(())
}
