use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

fn init_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    Ok(())
}

/// Schema for the on-device cart slot.
pub fn init_local_schema(conn: &Connection) -> Result<(), StorageError> {
    init_pragmas(conn)?;
    conn.execute_batch(LOCAL_SCHEMA_SQL)?;
    record_version(conn)
}

/// Schema for the per-user remote cart records.
pub fn init_remote_schema(conn: &Connection) -> Result<(), StorageError> {
    init_pragmas(conn)?;
    conn.execute_batch(REMOTE_SCHEMA_SQL)?;
    record_version(conn)
}

fn record_version(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, unixepoch())",
        rusqlite::params![SCHEMA_VERSION],
    )?;
    Ok(())
}

/// Highest schema version recorded in `conn`, if any.
pub fn schema_version(conn: &Connection) -> Result<Option<i32>, StorageError> {
    let version = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i32>>(0)
    })?;
    Ok(version)
}

const LOCAL_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS local_cache (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const REMOTE_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS remote_carts (
    user_id TEXT PRIMARY KEY CHECK (length(user_id) > 0),
    record BLOB NOT NULL,
    saved_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);
";
