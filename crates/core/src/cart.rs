use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;
use crate::ids::ProductId;
use crate::item::{CartItem, ProductSummary};

/// Ordered cart contents.
///
/// Invariants: at most one row per product id, every row has
/// `quantity >= 1`, and rows keep the position of their first add.
/// Serializes as a bare array of [`CartItem`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and wrap an ordered list of rows.
    pub fn from_items(items: Vec<CartItem>) -> Result<Self, CoreError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if item.quantity == 0 {
                return Err(CoreError::InvalidData(format!(
                    "item {} has zero quantity",
                    item.id
                )));
            }
            if !seen.insert(item.id) {
                return Err(CoreError::InvalidData(format!("duplicate item {}", item.id)));
            }
        }
        Ok(Self { items })
    }

    /// Caller guarantees the invariants already hold.
    pub(crate) fn from_unique(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: ProductId) -> bool {
        self.get(id).is_some()
    }

    /// Sum of all quantities (the number shown on a cart badge).
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    // ========================================================================
    // Mutations. Each returns whether the cart changed.
    // ========================================================================

    /// Add one unit of `product`. An existing row keeps its stored
    /// title/price/thumbnail even if `product` differs.
    pub fn add(&mut self, product: ProductSummary) -> bool {
        match self.items.iter_mut().find(|i| i.id == product.id) {
            Some(existing) => {
                let bumped = existing.quantity.saturating_add(1);
                let changed = bumped != existing.quantity;
                existing.quantity = bumped;
                changed
            }
            None => {
                self.items.push(CartItem::new(product, 1));
                true
            }
        }
    }

    pub fn remove(&mut self, id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    /// Ignored for unknown ids and for quantities below 1.
    pub fn set_quantity(&mut self, id: ProductId, quantity: i64) -> bool {
        let Ok(quantity) = u32::try_from(quantity) else {
            return false;
        };
        if quantity == 0 {
            return false;
        }
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) if item.quantity != quantity => {
                item.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.items.is_empty();
        self.items.clear();
        changed
    }
}

impl<'de> Deserialize<'de> for Cart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<CartItem>::deserialize(deserializer)?;
        Cart::from_items(items).map_err(serde::de::Error::custom)
    }
}
