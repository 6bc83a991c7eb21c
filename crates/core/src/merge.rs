//! Reconciliation of two cart snapshots.

use std::collections::HashMap;

use crate::cart::Cart;
use crate::ids::ProductId;
use crate::item::CartItem;

/// Combine a guest cart with a previously saved cart.
///
/// Guest rows are scanned first, then remote rows. The first sighting of an
/// id fixes the row's position and its title/price/thumbnail; every later
/// sighting, including duplicates inside the same list, only adds to the
/// quantity. Output order is first-sighting order: guest items, then
/// remote-only items.
///
/// Rows whose summed quantity is zero are dropped so the result always
/// satisfies the cart invariants.
pub fn merge(guest: &[CartItem], remote: &[CartItem]) -> Cart {
    let mut rows: Vec<CartItem> = Vec::with_capacity(guest.len() + remote.len());
    let mut positions: HashMap<ProductId, usize> = HashMap::new();

    for item in guest.iter().chain(remote) {
        match positions.get(&item.id).and_then(|&pos| rows.get_mut(pos)) {
            Some(row) => row.quantity = row.quantity.saturating_add(item.quantity),
            None => {
                positions.insert(item.id, rows.len());
                rows.push(item.clone());
            }
        }
    }

    rows.retain(|row| row.quantity > 0);
    Cart::from_unique(rows)
}
