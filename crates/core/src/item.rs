use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::ids::ProductId;

/// Non-negative unit price captured when an item is first added.
///
/// Serialized as a plain number so cached carts stay readable by any
/// JSON consumer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    pub fn new(amount: Decimal) -> Result<Self, CoreError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(CoreError::InvalidData(format!("negative price: {amount}")));
        }
        Ok(Self(amount))
    }

    /// Build from minor units, e.g. `from_cents(1999)` is 19.99.
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), 2))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price({})", self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = rust_decimal::serde::float::deserialize(deserializer)?;
        Price::new(amount).map_err(serde::de::Error::custom)
    }
}

/// Descriptive product data supplied by the catalog when an item is added.
/// Stored verbatim; never refetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub thumbnail: String,
}

/// One cart row. `quantity` is always at least 1 inside a [`crate::Cart`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub thumbnail: String,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product: ProductSummary, quantity: u32) -> Self {
        Self {
            id: product.id,
            title: product.title,
            price: product.price,
            thumbnail: product.thumbnail,
            quantity,
        }
    }

    /// Unit price times quantity.
    pub fn line_total(&self) -> Decimal {
        self.price.amount() * Decimal::from(self.quantity)
    }
}
