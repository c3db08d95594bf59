//! SQLite Snapshot Store
//!
//! Implements SnapshotStore on a single SQLite table.
//! Each call opens the database on a blocking thread.

use crate::domain::ports::SnapshotStore;
use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

/// SQLite-backed snapshot store.
pub struct SqliteSnapshotStore {
    db_path: String,
}

impl SqliteSnapshotStore {
    /// Open (and create if needed) the snapshot table at `db_path`.
    pub fn open(db_path: impl Into<String>) -> Result<Self> {
        let store = Self {
            db_path: db_path.into(),
        };
        store.init_db()?;
        tracing::info!("snapshot store initialized, db_path={}", store.db_path);
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS __sync_snapshots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn read(db_path: &str, key: &str) -> Result<Option<String>> {
        let conn = Connection::open(db_path)?;
        let value = conn
            .query_row(
                "SELECT value FROM __sync_snapshots WHERE key = ?",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(db_path: &str, key: &str, value: &str) -> Result<()> {
        let conn = Connection::open(db_path)?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        conn.execute(
            "INSERT OR REPLACE INTO __sync_snapshots (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, now],
        )?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let db_path = self.db_path.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::read(&db_path, &key)).await?
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let db_path = self.db_path.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::write(&db_path, &key, &value)).await?
    }
}
