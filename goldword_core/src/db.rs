//! Storage for GoldWord word lists
//!
//! Every namespace (one per learner) is persisted as a single JSON
//! document: a flat array of word records. Per-namespace settings live
//! next to it as small JSON values.

#[cfg(feature = "python")]
use pyo3::prelude::*;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// How long a writer waits for another process holding the database
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to parse word list: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Failed to encode word list: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Storage error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Invalid study config: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Backend holding one document per namespace
pub trait RecordRepository {
    /// Raw word-list document, `None` if the namespace was never written
    fn load(&self, namespace: &str) -> Result<Option<String>>;

    fn save(&mut self, namespace: &str, document: &str) -> Result<()>;

    /// Drop the namespace's word list. Settings are kept.
    fn clear(&mut self, namespace: &str) -> Result<()>;

    fn load_setting(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    fn save_setting(&mut self, namespace: &str, key: &str, value: &str) -> Result<()>;

    /// Hold the write lock until `commit` or `rollback`, so a
    /// read-modify-write of a namespace cannot interleave with another
    /// handle doing the same. Backends without transactions ignore it.
    fn begin_exclusive(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Namespace with its word count
#[cfg_attr(feature = "python", pyclass)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    #[cfg_attr(feature = "python", pyo3(get))]
    pub name: String,
    #[cfg_attr(feature = "python", pyo3(get))]
    pub word_count: i64,
}

/// Open (creating if needed) the database and its schema
pub fn init_database(db_path: impl AsRef<Path>) -> SqliteResult<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS word_lists (
            namespace TEXT PRIMARY KEY,
            document TEXT NOT NULL,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (namespace, key)
        )",
        [],
    )?;

    Ok(())
}

/// SQLite-backed repository
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self { conn: init_database(db_path)? })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        Ok(Self { conn })
    }

    /// All stored namespaces with their word counts (0 for unreadable documents)
    pub fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT namespace,
                    CASE WHEN json_valid(document) THEN json_array_length(document) ELSE 0 END
             FROM word_lists
             ORDER BY namespace",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(NamespaceInfo {
                name: row.get(0)?,
                word_count: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
            })
        })?;

        let namespaces = rows.collect::<SqliteResult<Vec<_>>>()?;
        Ok(namespaces)
    }
}

impl RecordRepository for SqliteRepository {
    fn load(&self, namespace: &str) -> Result<Option<String>> {
        let document = self
            .conn
            .query_row(
                "SELECT document FROM word_lists WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )
            .optional()?;
        Ok(document)
    }

    fn save(&mut self, namespace: &str, document: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO word_lists (namespace, document, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(namespace) DO UPDATE SET
                document = excluded.document,
                updated_at = CURRENT_TIMESTAMP",
            params![namespace, document],
        )?;
        Ok(())
    }

    fn clear(&mut self, namespace: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM word_lists WHERE namespace = ?1",
            params![namespace],
        )?;
        Ok(())
    }

    fn load_setting(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save_setting(&mut self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (namespace, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
            params![namespace, key, value],
        )?;
        Ok(())
    }

    // IMMEDIATE takes the write lock now instead of at the first write
    fn begin_exclusive(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

/// Process-local repository, nothing touches disk
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    documents: HashMap<String, String>,
    settings: HashMap<(String, String), String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordRepository for MemoryRepository {
    fn load(&self, namespace: &str) -> Result<Option<String>> {
        Ok(self.documents.get(namespace).cloned())
    }

    fn save(&mut self, namespace: &str, document: &str) -> Result<()> {
        self.documents.insert(namespace.to_string(), document.to_string());
        Ok(())
    }

    fn clear(&mut self, namespace: &str) -> Result<()> {
        self.documents.remove(namespace);
        Ok(())
    }

    fn load_setting(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .settings
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn save_setting(&mut self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.settings
            .insert((namespace.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}

// ============= Python Bindings =============

#[cfg(feature = "python")]
impl From<StoreError> for PyErr {
    fn from(err: StoreError) -> PyErr {
        pyo3::exceptions::PyRuntimeError::new_err(err.to_string())
    }
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "init_database")]
pub fn py_init_database(db_path: &str) -> PyResult<()> {
    init_database(db_path)
        .map(|_| ())
        .map_err(|e| pyo3::exceptions::PyRuntimeError::new_err(e.to_string()))
}

#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "list_namespaces")]
pub fn py_list_namespaces(db_path: &str) -> PyResult<Vec<NamespaceInfo>> {
    Ok(SqliteRepository::open(db_path)?.list_namespaces()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_document() {
        let mut repo = SqliteRepository::in_memory().unwrap();
        assert_eq!(repo.load("alice").unwrap(), None);

        repo.save("alice", r#"[{"word":"remote"}]"#).unwrap();
        repo.save("alice", r#"[{"word":"remote"},{"word":"abandon"}]"#).unwrap();

        assert_eq!(
            repo.load("alice").unwrap().as_deref(),
            Some(r#"[{"word":"remote"},{"word":"abandon"}]"#)
        );
        assert_eq!(repo.load("bob").unwrap(), None);
    }

    #[test]
    fn test_clear_keeps_settings() {
        let mut repo = SqliteRepository::in_memory().unwrap();
        repo.save("alice", "[]").unwrap();
        repo.save_setting("alice", "study_config", "{}").unwrap();

        repo.clear("alice").unwrap();

        assert_eq!(repo.load("alice").unwrap(), None);
        assert_eq!(repo.load_setting("alice", "study_config").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_list_namespaces_counts_words() {
        let mut repo = SqliteRepository::in_memory().unwrap();
        repo.save("bob", r#"[{"word":"a"},{"word":"b"},{"word":"c"}]"#).unwrap();
        repo.save("alice", r#"[{"word":"a"}]"#).unwrap();
        repo.save("broken", "[{not json").unwrap();

        let namespaces = repo.list_namespaces().unwrap();
        assert_eq!(
            namespaces,
            vec![
                NamespaceInfo { name: "alice".into(), word_count: 1 },
                NamespaceInfo { name: "bob".into(), word_count: 3 },
                NamespaceInfo { name: "broken".into(), word_count: 0 },
            ]
        );
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goldword.db");

        {
            let mut repo = SqliteRepository::open(&path).unwrap();
            repo.save("guest", r#"[{"word":"remote"}]"#).unwrap();
            repo.save_setting("guest", "study_config", r#"{"dailyTarget":30}"#).unwrap();
        }

        let repo = SqliteRepository::open(&path).unwrap();
        assert_eq!(repo.load("guest").unwrap().as_deref(), Some(r#"[{"word":"remote"}]"#));
        assert_eq!(
            repo.load_setting("guest", "study_config").unwrap().as_deref(),
            Some(r#"{"dailyTarget":30}"#)
        );
    }

    #[test]
    fn test_exclusive_transaction_rollback() {
        let mut repo = SqliteRepository::in_memory().unwrap();
        repo.save("guest", "[]").unwrap();

        repo.begin_exclusive().unwrap();
        repo.save("guest", r#"[{"word":"remote"}]"#).unwrap();
        repo.rollback().unwrap();
        assert_eq!(repo.load("guest").unwrap().as_deref(), Some("[]"));

        repo.begin_exclusive().unwrap();
        repo.save("guest", r#"[{"word":"remote"}]"#).unwrap();
        repo.commit().unwrap();
        assert_eq!(repo.load("guest").unwrap().as_deref(), Some(r#"[{"word":"remote"}]"#));
    }

    #[test]
    fn test_memory_repository() {
        let mut repo = MemoryRepository::new();
        repo.save("guest", "[]").unwrap();
        repo.save_setting("guest", "k", "v").unwrap();

        assert_eq!(repo.load("guest").unwrap().as_deref(), Some("[]"));
        assert_eq!(repo.load_setting("guest", "k").unwrap().as_deref(), Some("v"));
        assert_eq!(repo.load_setting("other", "k").unwrap(), None);

        repo.clear("guest").unwrap();
        assert_eq!(repo.load("guest").unwrap(), None);
    }
}
