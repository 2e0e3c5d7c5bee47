// src/database.rs
mod models;

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

use crate::{
    config::DatabaseConfig,
    errors::SailtrackError,
    models::{Mmsi, PositionReport},
};
use models::ReportRow;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS ais_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    received_at TEXT NOT NULL,
    mmsi INTEGER,
    raw_message BLOB NOT NULL
)";

const CREATE_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_ais_messages_mmsi_id ON ais_messages(mmsi, id)";

const SELECT_REPORT_SQL: &str =
    "SELECT id AS sequence_id, received_at, mmsi, raw_message AS raw_payload FROM ais_messages";

/// Append-only store of raw AIS stream messages
///
/// Rows are never updated or deleted. The `AUTOINCREMENT` key never reuses
/// ids, so "latest" is simply the highest id.
#[derive(Debug, Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    /// Open (or create) the database file and make sure the schema exists
    pub async fn open(config: &DatabaseConfig) -> Result<Self, SailtrackError> {
        config.validate()?;

        info!("Opening database at {}", config.path.display());
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true);

        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self, SailtrackError> {
        // WAL lets readers proceed alongside the single writer; FULL sync
        // makes a committed append survive power loss.
        let options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool. Call [`MessageStore::ensure_schema`] before use.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create table `ais_messages` and its lookup index if missing
    pub async fn ensure_schema(&self) -> Result<(), SailtrackError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(CREATE_TABLE_SQL)
            .execute(&mut *tx)
            .await
            .map_err(|e| SailtrackError::SchemaError(format!("ais_messages: {}", e)))?;

        sqlx::query(CREATE_INDEX_SQL)
            .execute(&mut *tx)
            .await
            .map_err(|e| SailtrackError::SchemaError(format!("idx_ais_messages_mmsi_id: {}", e)))?;

        tx.commit().await?;
        Ok(())
    }

    /// Append one message and return its sequence id.
    ///
    /// Returns only after the insert has been committed.
    pub async fn append(
        &self,
        mmsi: Option<Mmsi>,
        raw_payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<i64, SailtrackError> {
        let result = sqlx::query(
            "INSERT INTO ais_messages (received_at, mmsi, raw_message) VALUES (?1, ?2, ?3)",
        )
        .bind(received_at)
        .bind(mmsi.map(|m| i64::from(m.value())))
        .bind(raw_payload)
        .execute(&self.pool)
        .await?;

        let sequence_id = result.last_insert_rowid();
        debug!(sequence_id, ?mmsi, "Stored AIS message");
        Ok(sequence_id)
    }

    /// Most recent report for a vessel; `None` addresses unidentified reports
    pub async fn latest(&self, mmsi: Option<Mmsi>) -> Result<Option<PositionReport>, SailtrackError> {
        let query = format!("{SELECT_REPORT_SQL} WHERE mmsi IS ?1 ORDER BY id DESC LIMIT 1");
        let row: Option<ReportRow> = sqlx::query_as(&query)
            .bind(mmsi.map(|m| i64::from(m.value())))
            .fetch_optional(&self.pool)
            .await?;

        row.map(PositionReport::try_from).transpose()
    }

    /// Most recent report of any vessel
    pub async fn latest_any(&self) -> Result<Option<PositionReport>, SailtrackError> {
        let query = format!("{SELECT_REPORT_SQL} ORDER BY id DESC LIMIT 1");
        let row: Option<ReportRow> = sqlx::query_as(&query).fetch_optional(&self.pool).await?;

        row.map(PositionReport::try_from).transpose()
    }

    /// Number of stored reports
    pub async fn count(&self) -> Result<i64, SailtrackError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM ais_messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_ensure_schema_twice() -> Result<(), SailtrackError> {
        let temp_dir = tempdir().unwrap();
        let config = DatabaseConfig {
            path: temp_dir.path().join("test.db"),
        };
        let store = MessageStore::open(&config).await?;
        store.append(None, b"first", Utc::now()).await?;

        store.ensure_schema().await?;
        store.ensure_schema().await?;

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'ais_messages'",
        )
        .fetch_one(&store.pool)
        .await?;
        let indices: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_ais_messages_mmsi_id'",
        )
        .fetch_one(&store.pool)
        .await?;

        assert_eq!(tables, 1);
        assert_eq!(indices, 1);
        assert_eq!(store.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() -> Result<(), SailtrackError> {
        let temp_dir = tempdir().unwrap();
        let config = DatabaseConfig {
            path: temp_dir.path().join("test.db"),
        };

        let store = MessageStore::open(&config).await?;
        let mmsi = Mmsi::try_from(230_123_456u32)?;
        let id = store.append(Some(mmsi), b"{}", Utc::now()).await?;
        store.close().await;

        let store = MessageStore::open(&config).await?;
        let report = store.latest(Some(mmsi)).await?.expect("report survives reopen");
        assert_eq!(report.sequence_id, id);
        Ok(())
    }

    #[tokio::test]
    async fn test_wal_journal_mode() -> Result<(), SailtrackError> {
        let temp_dir = tempdir().unwrap();
        let config = DatabaseConfig {
            path: temp_dir.path().join("test.db"),
        };
        let store = MessageStore::open(&config).await?;

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&store.pool)
            .await?;
        assert_eq!(mode.to_lowercase(), "wal");
        Ok(())
    }
}
