use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::{
    backend::{duration_millis, schema, ClaimAttempt, RowStore},
    config::LocalConfig,
    JobId, JobRecord, QueueError, QueueResult,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const FILE_POOL_SIZE: u32 = 4;

/// Embedded SQLite row store
pub struct SqliteStore {
    pool: SqlitePool,
    location: String,
}

impl SqliteStore {
    /// Open (or create) the queue file described by `config`, creating its
    /// directory if needed
    pub async fn open(config: &LocalConfig) -> QueueResult<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.dir)
            .await
            .map_err(|e| QueueError::storage("creating queue directory", e))?;

        let path = config.db_path();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(FILE_POOL_SIZE)
            .connect_with(options)
            .await
            .map_err(|e| QueueError::storage("opening store", e))?;

        let store = Self {
            pool,
            location: path.display().to_string(),
        };
        store.migrate().await?;
        debug!(location = %store.location, "Opened sqlite queue store");
        Ok(store)
    }

    /// Private in-memory store, gone when the store is dropped
    pub async fn in_memory() -> QueueResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| QueueError::storage("opening store", e))?;

        // One connection that never idles out: the database lives in it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(|e| QueueError::storage("opening store", e))?;

        let store = Self {
            pool,
            location: ":memory:".to_string(),
        };
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool, running migrations on it
    pub async fn from_pool(pool: SqlitePool, location: impl Into<String>) -> QueueResult<Self> {
        let store = Self {
            pool,
            location: location.into(),
        };
        store.migrate().await?;
        Ok(store)
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> QueueResult<()> {
        for statement in schema::MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| QueueError::storage("creating queue schema", e))?;
        }
        Ok(())
    }

    fn row_to_record(row: &SqliteRow) -> QueueResult<JobRecord> {
        let read = |e: sqlx::Error| QueueError::storage("reading job row", e);
        Ok(JobRecord::from_columns(
            row.try_get("id").map_err(read)?,
            row.try_get("payload").map_err(read)?,
            row.try_get("enqueued_at").map_err(read)?,
            row.try_get("claimed").map_err(read)?,
            row.try_get("claim_expires").map_err(read)?,
            row.try_get("retries").map_err(read)?,
        ))
    }
}

#[async_trait]
impl RowStore for SqliteStore {
    async fn insert(&self, payload: &str) -> QueueResult<JobId> {
        let id: i64 = sqlx::query_scalar(schema::INSERT_JOB)
            .bind(payload)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| QueueError::storage("inserting job", e))?;

        Ok(JobId(id))
    }

    async fn try_claim(&self, max_retries: u32, lease: Duration) -> QueueResult<ClaimAttempt> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| QueueError::storage("beginning claim transaction", e))?;

        let candidate: Option<i64> = sqlx::query_scalar(schema::SELECT_CANDIDATE)
            .bind(i64::from(max_retries))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| QueueError::storage("selecting next job", e))?;

        let Some(candidate) = candidate else {
            tx.rollback()
                .await
                .map_err(|e| QueueError::storage("rolling back claim transaction", e))?;
            return Ok(ClaimAttempt::Empty);
        };

        let row = sqlx::query(schema::CLAIM_CANDIDATE)
            .bind(duration_millis(lease))
            .bind(candidate)
            .bind(i64::from(max_retries))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| QueueError::storage("claiming job", e))?;

        match row {
            Some(row) => {
                let record = Self::row_to_record(&row)?;
                tx.commit()
                    .await
                    .map_err(|e| QueueError::storage("committing claim transaction", e))?;
                Ok(ClaimAttempt::Claimed(record))
            }
            None => {
                tx.rollback()
                    .await
                    .map_err(|e| QueueError::storage("rolling back claim transaction", e))?;
                Ok(ClaimAttempt::Contended)
            }
        }
    }

    async fn ack(&self, id: JobId) -> QueueResult<()> {
        sqlx::query(schema::DELETE_JOB)
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::storage("acking job", e))?;

        Ok(())
    }

    async fn nack(&self, id: JobId, delay: Duration) -> QueueResult<()> {
        sqlx::query(schema::NACK_JOB)
            .bind(duration_millis(delay))
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::storage("nacking job", e))?;

        Ok(())
    }

    async fn size(&self, max_retries: u32) -> QueueResult<u64> {
        let count: i64 = sqlx::query_scalar(schema::COUNT_LIVE)
            .bind(i64::from(max_retries))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| QueueError::storage("counting jobs", e))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn reclaim_expired(&self) -> QueueResult<Vec<JobId>> {
        let ids: Vec<i64> = sqlx::query_scalar(schema::RECLAIM_EXPIRED)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| QueueError::storage("reclaiming expired leases", e))?;

        Ok(ids.into_iter().map(JobId).collect())
    }

    async fn record(&self, id: JobId) -> QueueResult<Option<JobRecord>> {
        let row = sqlx::query(schema::SELECT_RECORD)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| QueueError::storage("reading job", e))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    fn location(&self) -> &str {
        &self.location
    }
}
