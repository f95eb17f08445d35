use crate::detector_core::store_backend::{KvStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Duration;

/// SQLite-backed key-value store
///
/// One row per violation key. Re-inserting a key overwrites its value, which
/// makes reprocessing the same passage idempotent.
#[derive(Default)]
pub struct SqliteStore {
    conn: Option<Connection>,
}

impl SqliteStore {
    pub fn new() -> Self {
        Self { conn: None }
    }

    fn open(db_path: &str) -> Result<Connection, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("SQLite journal mode: {}", mode);
        conn.busy_timeout(Duration::from_millis(100))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS violations (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                stored_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(conn)
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn connect(&mut self, conn: &str) -> Result<(), StoreError> {
        self.conn = Some(Self::open(conn)?);
        log::info!("✅ SQLite store opened: {}", conn);
        Ok(())
    }

    async fn insert(&mut self, key: &str, value: &[u8]) -> Result<u64, StoreError> {
        let conn = self.conn.as_ref().ok_or(StoreError::NotConnected)?;

        let rows = conn.execute(
            "INSERT INTO violations (key, value, stored_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, stored_at = excluded.stored_at",
            params![key, value, Utc::now().timestamp()],
        )?;

        Ok(rows as u64)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| StoreError::from(e))?;
            log::debug!("SQLite store closed");
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
