use std::time::Duration;

use cartsync_core::{Cart, CartItem, ProductId, UserId};
use cartsync_engine::SyncConfig;
use cartsync_harness::{TestBackend, TestShopper, init_tracing, product, quantities};

/// A backend with one shopper already signed in as `alice` and holding
/// `guest` items from before login.
async fn signed_in(
    guest: &[i64],
) -> Result<(TestBackend, usize, UserId), Box<dyn std::error::Error>> {
    init_tracing();
    let mut backend = TestBackend::new()?;
    let s = backend.add_shopper(SyncConfig::immediate())?;
    for id in guest {
        backend.shopper(s).add(*id);
    }
    let alice = UserId::new("alice")?;
    backend.shopper_mut(s).sign_in(&alice).await?;
    Ok((backend, s, alice))
}

async fn settle(shopper: &TestShopper) {
    shopper.orchestrator.drain_pending().await;
}

// ============================================================================
// Propagation
// ============================================================================

#[tokio::test]
async fn mutations_reach_the_server() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, s, alice) = signed_in(&[1]).await?;
    let shopper = backend.shopper(s);

    shopper.add(2);
    shopper.set_quantity(1, 4);
    settle(shopper).await;

    assert_eq!(
        quantities(&backend.remote().stored(&alice).await?),
        vec![(1, 4), (2, 1)]
    );
    let stats = shopper.orchestrator.stats();
    assert_eq!(stats.pushes_issued, 2);
    assert_eq!(stats.pushes_succeeded, 2);
    assert_eq!(shopper.orchestrator.pending_pushes(), 0);
    Ok(())
}

#[tokio::test]
async fn cache_refills_on_first_signed_in_mutation() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, s, _alice) = signed_in(&[1]).await?;
    let shopper = backend.shopper(s);
    assert!(shopper.cached_quantities().is_empty());

    // The store still writes through to the cache on ordinary mutations.
    shopper.add(3);
    settle(shopper).await;
    assert_eq!(shopper.cached_quantities(), vec![(1, 1), (3, 1)]);
    Ok(())
}

#[tokio::test]
async fn remove_and_replace_are_pushed() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, s, alice) = signed_in(&[1, 2]).await?;
    let shopper = backend.shopper(s);

    shopper.store.remove_item(ProductId::new(1));
    settle(shopper).await;
    assert_eq!(quantities(&backend.remote().stored(&alice).await?), vec![(2, 1)]);

    let replacement = Cart::from_items(vec![CartItem::new(product(8), 5)])?;
    shopper.store.replace_all(replacement);
    settle(shopper).await;
    assert_eq!(quantities(&backend.remote().stored(&alice).await?), vec![(8, 5)]);
    Ok(())
}

// ============================================================================
// Skipped pushes
// ============================================================================

#[tokio::test]
async fn unchanged_snapshot_is_not_pushed() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, s, _alice) = signed_in(&[1]).await?;
    let shopper = backend.shopper(s);
    let saves_after_login = backend.remote().save_calls();

    // No-op mutations deliver the same snapshot again.
    let change = shopper.store.set_quantity(ProductId::new(1), 1);
    assert!(change.is_noop());
    shopper.store.set_quantity(ProductId::new(99), 3);
    shopper.store.set_quantity(ProductId::new(1), 0);

    // A fresh allocation with identical contents is also unchanged.
    let same = Cart::clone(&shopper.cart());
    let change = shopper.store.replace_all(same);
    assert!(!change.is_noop());
    settle(shopper).await;

    assert_eq!(backend.remote().save_calls(), saves_after_login);
    let stats = shopper.orchestrator.stats();
    assert_eq!(stats.pushes_issued, 0);
    assert_eq!(stats.pushes_skipped_unchanged, 4);
    Ok(())
}

#[tokio::test]
async fn empty_cart_never_overwrites_saved_cart() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, s, alice) = signed_in(&[1, 2]).await?;
    let shopper = backend.shopper(s);

    shopper.store.clear();
    settle(shopper).await;

    assert!(shopper.cart().is_empty());
    assert_eq!(
        quantities(&backend.remote().stored(&alice).await?),
        vec![(1, 1), (2, 1)]
    );
    assert_eq!(shopper.orchestrator.stats().pushes_skipped_empty, 1);

    // Adding back the same rows after an empty interlude is a real change.
    shopper.add(1);
    settle(shopper).await;
    assert_eq!(quantities(&backend.remote().stored(&alice).await?), vec![(1, 1)]);
    Ok(())
}

#[tokio::test]
async fn removing_last_item_leaves_server_copy() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, s, alice) = signed_in(&[4]).await?;
    let shopper = backend.shopper(s);

    shopper.store.remove_item(ProductId::new(4));
    settle(shopper).await;

    assert_eq!(quantities(&backend.remote().stored(&alice).await?), vec![(4, 1)]);
    Ok(())
}

// ============================================================================
// Failures and ordering
// ============================================================================

#[tokio::test]
async fn failed_push_is_counted_and_dropped() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, s, alice) = signed_in(&[1]).await?;
    let shopper = backend.shopper(s);
    backend.remote().set_offline(true);

    shopper.add(2);
    settle(shopper).await;

    let stats = shopper.orchestrator.stats();
    assert_eq!(stats.pushes_failed, 1);
    assert!(stats.last_failure.is_some());
    assert_eq!(shopper.quantities(), vec![(1, 1), (2, 1)]);

    // Not retried later; the next change carries the full cart.
    backend.remote().set_offline(false);
    assert_eq!(quantities(&backend.remote().stored(&alice).await?), vec![(1, 1)]);
    shopper.add(3);
    settle(shopper).await;
    assert_eq!(
        quantities(&backend.remote().stored(&alice).await?),
        vec![(1, 1), (2, 1), (3, 1)]
    );
    Ok(())
}

#[tokio::test]
async fn mutations_do_not_wait_for_saves() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, s, alice) = signed_in(&[1]).await?;
    let shopper = backend.shopper(s);
    backend.remote().delay_next_save(Duration::from_millis(200));

    let next = shopper.add(2);
    assert_eq!(quantities(next.items()), vec![(1, 1), (2, 1)]);
    assert_eq!(shopper.orchestrator.pending_pushes(), 1);

    settle(shopper).await;
    assert_eq!(shopper.orchestrator.pending_pushes(), 0);
    assert_eq!(
        quantities(&backend.remote().stored(&alice).await?),
        vec![(1, 1), (2, 1)]
    );
    Ok(())
}

#[tokio::test]
async fn slow_save_can_land_after_newer_one() -> Result<(), Box<dyn std::error::Error>> {
    let (backend, s, alice) = signed_in(&[1]).await?;
    let shopper = backend.shopper(s);
    backend.remote().delay_next_save(Duration::from_millis(200));

    shopper.add(2);
    shopper.add(3);
    settle(shopper).await;

    // Last write wins at the server, whichever snapshot it carried.
    assert_eq!(shopper.quantities(), vec![(1, 1), (2, 1), (3, 1)]);
    assert_eq!(
        quantities(&backend.remote().stored(&alice).await?),
        vec![(1, 1), (2, 1)]
    );
    Ok(())
}
