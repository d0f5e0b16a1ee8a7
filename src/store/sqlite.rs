//! SQLite-backed [`KeyValueStore`].
//!
//! One table, `kv_entries`, holds JSON-encoded values. File databases run in
//! WAL mode with a busy timeout; the schema is applied through the embedded
//! migrations on open.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, instrument, warn};

use super::error::StoreError;
use super::kv::{KeyValueStore, StoredMap};
use crate::clock::now_millis;

/// SQLite uses file-level locking, so a small pool is enough.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connections wait this long before returning `SQLITE_BUSY`.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Persistent key-value store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens the settings database at `path`.
    ///
    /// This will:
    /// 1. Create the file if it doesn't exist
    /// 2. Switch to WAL and set a busy timeout so CLI runs can overlap a
    ///    running bridge
    /// 3. Apply pending migrations for the `kv_entries` table
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite file
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails, or
    /// [`StoreError::Migration`] if the schema cannot be applied.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let db_url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("store opened");

        Ok(Self { pool })
    }

    /// Opens a private in-memory database.
    ///
    /// The single connection is never recycled, since closing it would drop
    /// the data.
    ///
    /// # Errors
    ///
    /// Same as [`SqliteStore::open`].
    #[instrument]
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Closes every pooled connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    #[instrument(skip(self))]
    async fn get(&self, keys: &[&str]) -> Result<StoredMap, StoreError> {
        let mut entries = StoredMap::new();
        for key in keys {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT value FROM kv_entries WHERE key = ?")
                    .bind(*key)
                    .fetch_optional(&self.pool)
                    .await?;
            let Some((raw,)) = row else {
                continue;
            };
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    entries.insert((*key).to_string(), value);
                }
                Err(error) => warn!(key, error = %error, "ignoring undecodable stored value"),
            }
        }
        Ok(entries)
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn set(&self, entries: StoredMap) -> Result<(), StoreError> {
        let updated_at = i64::try_from(now_millis()).unwrap_or(i64::MAX);
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            let encoded =
                serde_json::to_string(&value).map_err(|e| StoreError::serialize(&key, e))?;
            sqlx::query(
                "INSERT INTO kv_entries (key, value, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
                 updated_at = excluded.updated_at",
            )
            .bind(&key)
            .bind(encoded)
            .bind(updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_entries")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
