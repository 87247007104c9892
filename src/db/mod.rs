// Database module
// Durable key-value storage for reading marks, backed by SQLite

pub mod connection;
pub mod migrations;
pub mod operations;

use crate::error::Result;

pub use connection::DatabaseConnection;
pub use operations::SqliteStore;

/// Per-origin durable key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}
