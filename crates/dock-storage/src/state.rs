#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Persistence for small unsigned values keyed by name.
///
/// The firmware stores exactly one value through it: the device state code,
/// written whenever the state changes and read back at boot.
pub trait StateStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn load(&self, key: &str) -> StorageResult<Option<u32>>;

    /// Insert or replace the value under `key`.
    async fn store(&mut self, key: &str, value: u32) -> StorageResult<()>;
}

/// Volatile store for tests and diskless runs.
///
/// Clones share the same map, so a test can keep one clone to inspect what the
/// firmware wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    values: Arc<Mutex<HashMap<String, u32>>>,
    writes: Arc<Mutex<u32>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with one value, as left by a previous run.
    pub fn with_value(key: &str, value: u32) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        store
    }

    pub fn get(&self, key: &str) -> Option<u32> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    /// Number of `store` calls so far.
    pub fn write_count(&self) -> u32 {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStateStore {
    async fn load(&self, key: &str) -> StorageResult<Option<u32>> {
        Ok(self.get(key))
    }

    async fn store(&mut self, key: &str, value: u32) -> StorageResult<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

/// SQLite implementation of [`StateStore`] backed by the `station_state`
/// table.
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl StateStore for SqliteStateStore {
    async fn load(&self, key: &str) -> StorageResult<Option<u32>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT value
            FROM station_state
            WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(value,)| {
            u32::try_from(value).map_err(|_| StorageError::InvalidValue {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
    }

    async fn store(&mut self, key: &str, value: u32) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO station_state (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(i64::from(value))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
