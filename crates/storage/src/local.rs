use std::sync::{Mutex, MutexGuard};

use cartsync_core::CartItem;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::traits::{LOCAL_CART_KEY, LocalCartCache};

/// On-device cart slot backed by SQLite. The value is the JSON array of
/// cart rows stored under [`LOCAL_CART_KEY`].
pub struct SqliteCartCache {
    conn: Mutex<Connection>,
}

impl SqliteCartCache {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_local_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_local_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// The stored value exactly as written, if any.
    pub fn read_raw(&self) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM local_cache WHERE key = ?1",
                rusqlite::params![LOCAL_CART_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Store an arbitrary string under the cart key, bypassing encoding.
    pub fn write_raw(&self, value: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO local_cache (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![LOCAL_CART_KEY, value],
        )?;
        Ok(())
    }
}

fn decode_cached(raw: &str) -> Vec<CartItem> {
    match serde_json::from_str::<Vec<CartItem>>(raw) {
        Ok(items) if items.iter().all(|i| i.quantity > 0) => items,
        Ok(_) => {
            debug!("discarding cached cart with zero-quantity rows");
            Vec::new()
        }
        Err(e) => {
            debug!(error = %e, "discarding unparsable cached cart");
            Vec::new()
        }
    }
}

impl LocalCartCache for SqliteCartCache {
    fn read(&self) -> Vec<CartItem> {
        match self.read_raw() {
            Ok(Some(raw)) => decode_cached(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "local cart cache unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    fn write(&self, items: &[CartItem]) -> Result<(), StorageError> {
        let encoded =
            serde_json::to_string(items).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.write_raw(&encoded)
    }

    fn clear(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM local_cache WHERE key = ?1",
            rusqlite::params![LOCAL_CART_KEY],
        )?;
        Ok(())
    }
}
