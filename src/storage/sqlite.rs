//! SQLite history store implementation
//!
//! This module provides a SQLite-based implementation of the `HistoryStore` trait.
//!
//! ## Layout
//!
//! - `check_outputs(check_name, key, status, payload)` clustered on
//!   `(check_name, key)`, so each check is its own ordered range and
//!   "newest first" is a reverse range scan
//! - `action_outputs(key, payload)` flat
//!
//! Payloads are the JSON serialization of the output structs.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers never wait on the writer
//! - **Connection pooling**: Concurrent reads from the API and the runners
//! - **Migrations**: Automatic schema versioning with sqlx

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::HistoryStore;
use super::error::{StorageError, StorageResult};
use super::schema::{action_key, timestamp_key};
use crate::check::{ActionMeta, ActionOutput, Check, CheckOutput, CheckStatus};

/// SQLite history store
pub struct SqliteHistoryStore {
    pool: Pool<Sqlite>,
}

impl SqliteHistoryStore {
    /// Open (or create) the store file and run migrations
    ///
    /// Restarting against an existing file reuses its history.
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("opening history store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    async fn partition_exists(&self, name: &str) -> StorageResult<bool> {
        let row = sqlx::query("SELECT 1 FROM check_outputs WHERE check_name = ? LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    fn decode_outputs(rows: Vec<sqlx::sqlite::SqliteRow>) -> StorageResult<Vec<CheckOutput>> {
        rows.into_iter()
            .map(|row| -> StorageResult<CheckOutput> {
                let payload: String = row.get("payload");
                Ok(serde_json::from_str(&payload)?)
            })
            .collect()
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    #[instrument(skip(self, check, output), fields(check = %check.name))]
    async fn put_check(&self, check: &Check, output: &CheckOutput) -> StorageResult<String> {
        let key = timestamp_key(&output.timestamp);
        let payload = serde_json::to_string(output)?;

        sqlx::query(
            r#"
            INSERT INTO check_outputs (check_name, key, status, payload)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (check_name, key) DO UPDATE SET
                status = excluded.status,
                payload = excluded.payload
            "#,
        )
        .bind(&check.name)
        .bind(&key)
        .bind(output.status.as_str())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        debug!("stored check output under {}", key);
        Ok(key)
    }

    #[instrument(skip(self, action, output), fields(action = %action.name))]
    async fn put_action(
        &self,
        check_name: &str,
        action: &ActionMeta,
        output: &ActionOutput,
    ) -> StorageResult<String> {
        let key = action_key(check_name, &action.name, &output.timestamp);
        let payload = serde_json::to_string(output)?;

        sqlx::query(
            r#"
            INSERT INTO action_outputs (key, check_name, payload)
            VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET
                check_name = excluded.check_name,
                payload = excluded.payload
            "#,
        )
        .bind(&key)
        .bind(check_name)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(key)
    }

    async fn get_check(&self, name: &str, key: &str) -> StorageResult<CheckOutput> {
        let row = sqlx::query("SELECT payload FROM check_outputs WHERE check_name = ? AND key = ?")
            .bind(name)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("check '{name}' key '{key}'")))?;

        let payload: String = row.get("payload");
        Ok(serde_json::from_str(&payload)?)
    }

    async fn get_action(&self, key: &str) -> StorageResult<ActionOutput> {
        let row = sqlx::query("SELECT payload FROM action_outputs WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("action '{key}'")))?;

        let payload: String = row.get("payload");
        Ok(serde_json::from_str(&payload)?)
    }

    async fn get_check_action(&self, check_name: &str, key: &str) -> StorageResult<ActionOutput> {
        let row =
            sqlx::query("SELECT payload FROM action_outputs WHERE key = ? AND check_name = ?")
                .bind(key)
                .bind(check_name)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| {
                    StorageError::NotFound(format!("action '{key}' of check '{check_name}'"))
                })?;

        let payload: String = row.get("payload");
        Ok(serde_json::from_str(&payload)?)
    }

    async fn get_all_check_names(&self) -> StorageResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT check_name FROM check_outputs ORDER BY check_name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.get("check_name")).collect())
    }

    async fn get_check_status(&self, name: &str) -> StorageResult<Option<CheckOutput>> {
        let rows = sqlx::query(
            r#"
            SELECT payload FROM check_outputs
            WHERE check_name = ?
            ORDER BY key DESC
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(Self::decode_outputs(rows)?.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn get_named_check(&self, name: &str, limit: usize) -> StorageResult<Vec<CheckOutput>> {
        let rows = sqlx::query(
            r#"
            SELECT payload FROM check_outputs
            WHERE check_name = ?
            ORDER BY key DESC
            LIMIT ?
            "#,
        )
        .bind(name)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() && !self.partition_exists(name).await? {
            return Err(StorageError::NotFound(format!("check '{name}'")));
        }

        Self::decode_outputs(rows)
    }

    #[instrument(skip(self))]
    async fn get_named_check_failures(
        &self,
        name: &str,
        limit: usize,
    ) -> StorageResult<Vec<CheckOutput>> {
        let rows = sqlx::query(
            r#"
            SELECT payload FROM check_outputs
            WHERE check_name = ? AND status = ?
            ORDER BY key DESC
            LIMIT ?
            "#,
        )
        .bind(name)
        .bind(CheckStatus::Failed.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() && !self.partition_exists(name).await? {
            return Err(StorageError::NotFound(format!("check '{name}'")));
        }

        Self::decode_outputs(rows)
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite history store");
        self.pool.close().await;
        Ok(())
    }
}
