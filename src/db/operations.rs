use rusqlite::{params, OptionalExtension};

use crate::db::connection::DatabaseConnection;
use crate::db::KeyValueStore;
use crate::error::Result;

/// SQLite-backed key-value store
#[derive(Clone)]
pub struct SqliteStore {
    db: DatabaseConnection,
}

impl SqliteStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::in_memory()?))
    }

    /// Unix time of the last write to `key`
    pub fn updated_at(&self, key: &str) -> Result<Option<i64>> {
        let conn = self.db.get_connection();
        let conn = conn.lock();
        let updated = conn
            .query_row(
                "SELECT updated_at FROM key_value WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(updated)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.db.get_connection();
        let conn = conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM key_value WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.db.get_connection();
        let conn = conn.lock();
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO key_value (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.db.get_connection();
        let conn = conn.lock();
        conn.execute("DELETE FROM key_value WHERE key = ?1", params![key])?;
        Ok(())
    }
}
