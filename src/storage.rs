//! Durable key-value storage for the offline queue.
//!
//! [`SqliteStore`] keeps values in a single SQLite table so the queue survives
//! process restarts. [`MemoryStore`] is a volatile stand-in for hosts that
//! persist elsewhere, and for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, TrackerError};

/// String key-value storage.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store. Contents are lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| TrackerError::storage("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TrackerError::storage("memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TrackerError::storage("memory store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(feature = "persistence")]
pub use sqlite::SqliteStore;

#[cfg(feature = "persistence")]
mod sqlite {
    use std::sync::Mutex;

    use rusqlite::{params, Connection, OptionalExtension};

    use super::KeyValueStore;
    use crate::error::{Result, TrackerError};

    /// SQLite-backed key-value store.
    pub struct SqliteStore {
        db: Mutex<Connection>,
    }

    impl SqliteStore {
        /// Open (or create) the database at `db_path`.
        pub fn new(db_path: &str) -> Result<Self> {
            let db = Connection::open(db_path)?;
            Self::init_schema(&db)?;
            Ok(Self { db: Mutex::new(db) })
        }

        /// Create an in-memory database (for testing).
        pub fn in_memory() -> Result<Self> {
            Self::new(":memory:")
        }

        fn init_schema(conn: &Connection) -> Result<()> {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS kv_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
                );
            "#,
            )?;
            Ok(())
        }

        fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
            self.db
                .lock()
                .map_err(|_| TrackerError::storage("sqlite connection lock poisoned"))
        }
    }

    impl KeyValueStore for SqliteStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            let value = self
                .conn()?
                .query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.conn()?.execute(
                "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                     updated_at = strftime('%s', 'now')",
                params![key, value],
            )?;
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.conn()?
                .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("queue").unwrap(), None);
        store.set("queue", "[]").unwrap();
        assert_eq!(store.get("queue").unwrap().as_deref(), Some("[]"));
        store.set("queue", "[1]").unwrap();
        assert_eq!(store.get("queue").unwrap().as_deref(), Some("[1]"));
        store.remove("queue").unwrap();
        assert_eq!(store.get("queue").unwrap(), None);
        // Removing a missing key is fine
        store.remove("queue").unwrap();
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[cfg(feature = "persistence")]
    #[test]
    fn test_sqlite_store() {
        exercise(&SqliteStore::in_memory().unwrap());
    }
}
