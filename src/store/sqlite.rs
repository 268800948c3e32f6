//! SQLite-backed key-value store for learner state

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::KeyValueStore;

/// Single-table JSON store
pub struct SqliteKvStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    /// Open (or create) the database at `path`
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init_schema(&conn)?;

        info!("Opened learner database at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Database that lives only as long as this value
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<KvStats> {
        let conn = self.conn.lock().await;

        let entries: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        let last_updated: Option<String> =
            conn.query_row("SELECT MAX(updated_at) FROM kv", [], |row| row.get(0))?;

        Ok(KvStats {
            entries: entries as usize,
            last_updated,
        })
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str, default: Value) -> Result<Value> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        let raw: Option<String> = stmt.query_row(params![key], |row| row.get(0)).optional()?;

        match raw {
            Some(text) => serde_json::from_str(&text)
                .with_context(|| format!("Stored value for '{}' is not valid JSON", key)),
            None => Ok(default),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let conn = self.conn.lock().await;
        let text = serde_json::to_string(&value)?;

        conn.execute(
            r#"INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
            params![key, text, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct KvStats {
    pub entries: usize,
    pub last_updated: Option<String>,
}
