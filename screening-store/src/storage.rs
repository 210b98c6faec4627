//! String-set key-value storage (SQLite and in-memory)

use rusqlite::{params, Connection};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A key-value store whose values are sets of strings.
///
/// Every store is scoped to one namespace, so the keyword list and the
/// block history can share a database file without seeing each other.
pub trait SetStore: Send {
    /// All members stored under `key` (empty if the key is absent)
    fn members(&self, key: &str) -> Result<HashSet<String>, StorageError>;

    /// Add a member; returns false if it was already present
    fn insert(&mut self, key: &str, member: &str) -> Result<bool, StorageError>;

    /// Remove a member; returns false if it was not present
    fn remove(&mut self, key: &str, member: &str) -> Result<bool, StorageError>;

    /// Number of members stored under `key`
    fn count(&self, key: &str) -> Result<usize, StorageError> {
        Ok(self.members(key)?.len())
    }

    /// Drop the whole set stored under `key`
    fn clear(&mut self, key: &str) -> Result<(), StorageError>;
}

/// SQLite-backed set store
pub struct SqliteSetStore {
    conn: Connection,
    namespace: String,
}

impl SqliteSetStore {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P, namespace: &str) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, namespace)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(namespace: &str) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, namespace)
    }

    fn with_connection(conn: Connection, namespace: &str) -> Result<Self, StorageError> {
        let store = Self {
            conn,
            namespace: namespace.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS string_sets (
                namespace TEXT NOT NULL,
                set_key TEXT NOT NULL,
                member TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (namespace, set_key, member)
            );
            "#,
        )?;
        Ok(())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl SetStore for SqliteSetStore {
    fn members(&self, key: &str) -> Result<HashSet<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT member FROM string_sets WHERE namespace = ?1 AND set_key = ?2")?;

        let rows = stmt.query_map(params![self.namespace, key], |row| row.get::<_, String>(0))?;

        let mut members = HashSet::new();
        for row in rows {
            members.insert(row?);
        }
        Ok(members)
    }

    fn insert(&mut self, key: &str, member: &str) -> Result<bool, StorageError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO string_sets (namespace, set_key, member) VALUES (?1, ?2, ?3)",
            params![self.namespace, key, member],
        )?;
        Ok(changed > 0)
    }

    fn remove(&mut self, key: &str, member: &str) -> Result<bool, StorageError> {
        let changed = self.conn.execute(
            "DELETE FROM string_sets WHERE namespace = ?1 AND set_key = ?2 AND member = ?3",
            params![self.namespace, key, member],
        )?;
        Ok(changed > 0)
    }

    fn count(&self, key: &str) -> Result<usize, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM string_sets WHERE namespace = ?1 AND set_key = ?2",
            params![self.namespace, key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn clear(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM string_sets WHERE namespace = ?1 AND set_key = ?2",
            params![self.namespace, key],
        )?;
        Ok(())
    }
}

/// In-memory set store
#[derive(Debug, Default)]
pub struct MemorySetStore {
    sets: HashMap<String, HashSet<String>>,
}

impl MemorySetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SetStore for MemorySetStore {
    fn members(&self, key: &str) -> Result<HashSet<String>, StorageError> {
        Ok(self.sets.get(key).cloned().unwrap_or_default())
    }

    fn insert(&mut self, key: &str, member: &str) -> Result<bool, StorageError> {
        Ok(self
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    fn remove(&mut self, key: &str, member: &str) -> Result<bool, StorageError> {
        Ok(self
            .sets
            .get_mut(key)
            .map(|set| set.remove(member))
            .unwrap_or(false))
    }

    fn clear(&mut self, key: &str) -> Result<(), StorageError> {
        self.sets.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &mut dyn SetStore) {
        assert!(store.members("k").unwrap().is_empty());
        assert!(store.insert("k", "a").unwrap());
        assert!(store.insert("k", "b").unwrap());
        assert!(!store.insert("k", "a").unwrap());
        assert_eq!(store.count("k").unwrap(), 2);

        assert!(store.remove("k", "a").unwrap());
        assert!(!store.remove("k", "a").unwrap());
        assert_eq!(store.members("k").unwrap(), HashSet::from(["b".to_string()]));

        store.clear("k").unwrap();
        assert_eq!(store.count("k").unwrap(), 0);
    }

    #[test]
    fn test_memory_store_set_semantics() {
        let mut store = MemorySetStore::new();
        exercise(&mut store);
    }

    #[test]
    fn test_sqlite_store_set_semantics() {
        let mut store = SqliteSetStore::open_in_memory("test").unwrap();
        exercise(&mut store);
    }

    #[test]
    fn test_sqlite_namespaces_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screener.db");

        let mut keywords = SqliteSetStore::open(&path, "keywords").unwrap();
        let mut history = SqliteSetStore::open(&path, "history").unwrap();

        keywords.insert("set", "spam").unwrap();
        history.insert("set", "+1234567890|1|r|c").unwrap();

        assert_eq!(keywords.count("set").unwrap(), 1);
        assert_eq!(history.count("set").unwrap(), 1);
        assert!(keywords.members("set").unwrap().contains("spam"));
        assert!(!history.members("set").unwrap().contains("spam"));

        history.clear("set").unwrap();
        assert_eq!(keywords.count("set").unwrap(), 1);
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("screener.db");

        {
            let mut store = SqliteSetStore::open(&path, "ns").unwrap();
            store.insert("set", "warranty").unwrap();
        }

        let store = SqliteSetStore::open(&path, "ns").unwrap();
        assert_eq!(store.namespace(), "ns");
        assert!(store.members("set").unwrap().contains("warranty"));
    }
}
