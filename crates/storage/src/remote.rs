use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cartsync_core::{CartItem, UserId};
use rusqlite::{Connection, OptionalExtension};

use crate::error::StorageError;
use crate::traits::{RemoteCartRecord, RemoteCartRepository};

/// Remote cart records kept in a SQLite database, one MessagePack-encoded
/// [`RemoteCartRecord`] per user.
///
/// Cloning shares the underlying connection, so several shoppers in a test
/// can talk to the same "server".
#[derive(Clone)]
pub struct SqliteCartRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCartRepository {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_remote_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_remote_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking database call off the async executor.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::RemoteUnavailable(format!("storage task failed: {e}")))?
    }

    /// Number of users with a saved record.
    pub async fn record_count(&self) -> Result<u64, StorageError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM remote_carts", [], |row| row.get(0))?;
            u64::try_from(count)
                .map_err(|_| StorageError::Serialization(format!("bad record count {count}")))
        })
        .await
    }

    /// Remove a user's record. Not part of the sync protocol; used to
    /// simulate server-side resets.
    pub async fn delete(&self, user_id: &UserId) -> Result<(), StorageError> {
        let key = user_id.as_str().to_owned();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM remote_carts WHERE user_id = ?1",
                rusqlite::params![key],
            )?;
            Ok(())
        })
        .await
    }
}

fn encode_record(record: &RemoteCartRecord) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec_named(record).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_record(bytes: &[u8]) -> Result<RemoteCartRecord, StorageError> {
    rmp_serde::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[async_trait]
impl RemoteCartRepository for SqliteCartRepository {
    async fn load(&self, user_id: &UserId) -> Result<Vec<CartItem>, StorageError> {
        let key = user_id.as_str().to_owned();
        self.with_conn(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT record FROM remote_carts WHERE user_id = ?1",
                    rusqlite::params![key],
                    |row| row.get(0),
                )
                .optional()?;
            match bytes {
                Some(bytes) => Ok(decode_record(&bytes)?.items),
                None => Ok(Vec::new()),
            }
        })
        .await
        .map_err(StorageError::into_remote)
    }

    async fn save(&self, user_id: &UserId, items: &[CartItem]) -> Result<(), StorageError> {
        let key = user_id.as_str().to_owned();
        let record = encode_record(&RemoteCartRecord {
            items: items.to_vec(),
        })
        .map_err(StorageError::into_remote)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO remote_carts (user_id, record) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET record = excluded.record,
                    saved_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)",
                rusqlite::params![key, record],
            )?;
            Ok(())
        })
        .await
        .map_err(StorageError::into_remote)
    }
}
