//! SQLite-backed store.
//!
//! One `kv` table holding JSON-encoded values. The connection sits behind a
//! mutex; queries are short and never held across an await point.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use super::UsageStore;
use crate::error::StoreError;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".into()))
    }

    fn kv_get(conn: &Connection, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        raw.map(|text| {
            serde_json::from_str(&text).map_err(|e| StoreError::Malformed {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl UsageStore for SqliteStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let conn = self.conn()?;
        let mut out = Map::new();
        for key in keys {
            if let Some(v) = Self::kv_get(&conn, key)? {
                out.insert(key.to_string(), v);
            }
        }
        Ok(out)
    }

    async fn set(&self, values: Map<String, Value>) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for (key, value) in &values {
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.conn()?.execute("DELETE FROM kv", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("siteblock.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            let mut values = Map::new();
            values.insert("blockedSites".into(), json!(["example.com"]));
            store.set(values).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let got = store.get(&["blockedSites", "missing"]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["blockedSites"], json!(["example.com"]));
    }

    #[tokio::test]
    async fn clear_removes_all_keys() {
        let store = SqliteStore::open_memory().unwrap();
        let mut values = Map::new();
        values.insert("a".into(), json!({"x": 1}));
        values.insert("b".into(), json!(true));
        store.set(values).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.get(&["a", "b"]).await.unwrap().is_empty());
    }
}
