//! String-keyed value stores.
//!
//! The session state manager persists its transcript through
//! [`KeyValueStore`]. Reads and writes are synchronous; callers decide
//! whether a failure matters.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use insurechat_core::error::InsureChatError;

use crate::db::Database;

/// A simple get/set/remove store keyed by string.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, InsureChatError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), InsureChatError>;

    /// Delete `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), InsureChatError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, InsureChatError> {
        self.entries
            .lock()
            .map_err(|e| InsureChatError::Storage(format!("memory store lock poisoned: {}", e)))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, InsureChatError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), InsureChatError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), InsureChatError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Store backed by the `kv_store` table of a SQLite database.
#[derive(Debug)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open (or create) a database file and wrap it.
    pub fn open(path: &Path) -> Result<Self, InsureChatError> {
        Ok(Self::new(Database::new(path)?))
    }

    pub fn in_memory() -> Result<Self, InsureChatError> {
        Ok(Self::new(Database::in_memory()?))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, InsureChatError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| InsureChatError::Storage(format!("Failed to read {}: {}", key, e)))
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), InsureChatError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value, Utc::now().timestamp()],
            )
            .map_err(|e| InsureChatError::Storage(format!("Failed to write {}: {}", key, e)))?;
            debug!(key, bytes = value.len(), "Stored value");
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<(), InsureChatError> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .map_err(|e| {
                    InsureChatError::Storage(format!("Failed to remove {}: {}", key, e))
                })?;
            Ok(())
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("k", "first").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("first"));

        store.set("k", "second").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("second"));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        // Removing again is fine.
        store.remove("k").unwrap();
    }

    // ---- MemoryStore ----

    #[test]
    fn test_memory_store_roundtrip() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_memory_store_keys_are_independent() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }

    // ---- SqliteStore ----

    #[test]
    fn test_sqlite_store_roundtrip() {
        exercise(&SqliteStore::in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("messages", r#"[{"role":"user"}]"#).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("messages").unwrap().as_deref(),
            Some(r#"[{"role":"user"}]"#)
        );
    }

    #[test]
    fn test_sqlite_store_unicode_value() {
        let store = SqliteStore::in_memory().unwrap();
        store.set("k", "couverture \u{00e9}lev\u{00e9}e \u{1f4b0}").unwrap();
        assert!(store.get("k").unwrap().unwrap().contains('\u{1f4b0}'));
    }
}
