use async_trait::async_trait;
use cartsync_core::{CartItem, UserId};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Fixed key of the single on-device cart slot.
pub const LOCAL_CART_KEY: &str = "cart";

/// Durable, single-slot cart storage on the current device.
///
/// Reads never fail: a missing or unparsable value reads back as an empty
/// list.
pub trait LocalCartCache: Send + Sync {
    fn read(&self) -> Vec<CartItem>;

    /// Replace the stored value with `items`.
    fn write(&self, items: &[CartItem]) -> Result<(), StorageError>;

    /// Remove the stored value entirely.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Value stored per user in the remote cart store. Last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCartRecord {
    pub items: Vec<CartItem>,
}

/// Remote, per-user cart records.
///
/// Every call is a single attempt; transport or storage failures surface as
/// [`StorageError::RemoteUnavailable`].
#[async_trait]
pub trait RemoteCartRepository: Send + Sync {
    /// The saved items for `user_id`, or an empty list if none were saved.
    async fn load(&self, user_id: &UserId) -> Result<Vec<CartItem>, StorageError>;

    /// Overwrite the whole record for `user_id`.
    async fn save(&self, user_id: &UserId, items: &[CartItem]) -> Result<(), StorageError>;
}
