//! Tabular store holding the watched URLs and their price cells.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Mutex;

use crate::config::StoreConfig;
use crate::models::{Column, StoreRow};
use crate::utils::error::AppError;

#[async_trait]
pub trait RowStore: Send + Sync {
    /// Every row in store order.
    async fn read_all(&self) -> crate::Result<Vec<StoreRow>>;

    /// Overwrites one cell. Fails with `AppError::ExternalWrite` if the row is gone.
    async fn write_cell(&self, row: i64, column: Column, value: &str) -> crate::Result<()>;
}

#[derive(Debug, FromRow)]
struct WatchRowRecord {
    row_id: i64,
    url: String,
    price: String,
}

pub struct SqliteRowStore {
    pool: SqlitePool,
}

impl SqliteRowStore {
    pub async fn connect(config: &StoreConfig) -> crate::Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);

        let parent = options.clone().get_filename().parent().map(|p| p.to_path_buf());
        if let Some(parent) = parent.filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!("Connected to row store at {}", config.database_url);
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> crate::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS watch_rows (
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                price TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Appends a row for `url` and returns its row number.
    pub async fn add_url(&self, url: &str) -> crate::Result<i64> {
        let result = sqlx::query("INSERT INTO watch_rows (url) VALUES (?)")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Deletes every row holding `url`; returns how many were removed.
    pub async fn remove_url(&self, url: &str) -> crate::Result<u64> {
        let result = sqlx::query("DELETE FROM watch_rows WHERE TRIM(url) = ?")
            .bind(url.trim())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn updated_at(&self, row: i64) -> crate::Result<Option<String>> {
        let value: Option<(String,)> = sqlx::query_as("SELECT updated_at FROM watch_rows WHERE row_id = ?")
            .bind(row)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.map(|(updated_at,)| updated_at))
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn read_all(&self) -> crate::Result<Vec<StoreRow>> {
        let records: Vec<WatchRowRecord> =
            sqlx::query_as("SELECT row_id, url, price FROM watch_rows ORDER BY row_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(records
            .into_iter()
            .map(|record| StoreRow {
                row: record.row_id,
                url: record.url,
                price_cell: record.price,
            })
            .collect())
    }

    async fn write_cell(&self, row: i64, column: Column, value: &str) -> crate::Result<()> {
        // Column names come from a closed enum, never from input.
        let sql = format!("UPDATE watch_rows SET {} = ? WHERE row_id = ?", column.as_str());
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(row)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::ExternalWrite {
                row,
                message: e.to_string(),
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::ExternalWrite {
                row,
                message: "row no longer exists".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoryRow {
    row: i64,
    url: String,
    price: String,
    updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub row: i64,
    pub column: Column,
    pub value: String,
}

/// In-process store with failure injection, used for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryRowStore {
    rows: Mutex<Vec<MemoryRow>>,
    writes: Mutex<Vec<RecordedWrite>>,
    failing_rows: Mutex<HashSet<i64>>,
    fail_reads: Mutex<bool>,
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("memory store lock poisoned".to_string())
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// One row per URL with blank cells, numbered from 1.
    pub fn with_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for url in urls {
            store.push(url, "");
        }
        store
    }

    pub fn push(&self, url: impl Into<String>, price: impl Into<String>) -> i64 {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let row = rows.iter().map(|r| r.row).max().unwrap_or(0) + 1;
        rows.push(MemoryRow {
            row,
            url: url.into(),
            price: price.into(),
            updated_at: String::new(),
        });
        row
    }

    pub fn remove_url(&self, url: &str) -> usize {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let before = rows.len();
        rows.retain(|r| r.url.trim() != url.trim());
        before - rows.len()
    }

    pub fn set_price(&self, url: &str, price: impl Into<String>) {
        let price = price.into();
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        for row in rows.iter_mut().filter(|r| r.url.trim() == url.trim()) {
            row.price = price.clone();
        }
    }

    pub fn fail_writes_for(&self, row: i64) {
        self.failing_rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(row);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    pub fn row_for(&self, url: &str) -> Option<i64> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.iter().find(|r| r.url.trim() == url.trim()).map(|r| r.row)
    }

    /// Current `(price, updated_at)` of the first row holding `url`.
    pub fn cells(&self, url: &str) -> Option<(String, String)> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.iter()
            .find(|r| r.url.trim() == url.trim())
            .map(|r| (r.price.clone(), r.updated_at.clone()))
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn read_all(&self) -> crate::Result<Vec<StoreRow>> {
        if *self.fail_reads.lock().map_err(poisoned)? {
            return Err(AppError::Internal("row store unavailable".to_string()));
        }

        let rows = self.rows.lock().map_err(poisoned)?;
        Ok(rows
            .iter()
            .map(|r| StoreRow {
                row: r.row,
                url: r.url.clone(),
                price_cell: r.price.clone(),
            })
            .collect())
    }

    async fn write_cell(&self, row: i64, column: Column, value: &str) -> crate::Result<()> {
        if self.failing_rows.lock().map_err(poisoned)?.contains(&row) {
            return Err(AppError::ExternalWrite {
                row,
                message: "injected write failure".to_string(),
            });
        }

        let mut rows = self.rows.lock().map_err(poisoned)?;
        let target = rows.iter_mut().find(|r| r.row == row).ok_or_else(|| AppError::ExternalWrite {
            row,
            message: "row no longer exists".to_string(),
        })?;

        match column {
            Column::Price => target.price = value.to_string(),
            Column::UpdatedAt => target.updated_at = value.to_string(),
        }

        self.writes.lock().map_err(poisoned)?.push(RecordedWrite {
            row,
            column,
            value: value.to_string(),
        });
        Ok(())
    }
}
