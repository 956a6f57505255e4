use async_trait::async_trait;
use libsql::{params, Builder, Connection, Row};
use std::time::Duration;
use tracing::debug;

use crate::{
    backend::{duration_millis, schema, ClaimAttempt, RowStore},
    config::RemoteConfig,
    JobId, JobRecord, QueueError, QueueResult,
};

/// Networked libSQL replica (Turso) row store
pub struct RemoteStore {
    conn: Connection,
    location: String,
}

impl RemoteStore {
    /// Connect to the endpoint in `config` and make sure the schema exists
    pub async fn connect(config: &RemoteConfig) -> QueueResult<Self> {
        let endpoint = endpoint_url(config);
        let token = config.auth_token.clone().unwrap_or_default();

        let db = Builder::new_remote(endpoint, token)
            .build()
            .await
            .map_err(|e| QueueError::storage("connecting to remote store", e))?;
        let conn = db
            .connect()
            .map_err(|e| QueueError::storage("connecting to remote store", e))?;

        let store = Self {
            conn,
            location: config.location().to_string(),
        };
        store.migrate().await?;
        debug!(location = %store.location, "Connected to remote queue store");
        Ok(store)
    }

    async fn migrate(&self) -> QueueResult<()> {
        for statement in schema::MIGRATIONS {
            self.conn
                .execute(statement, ())
                .await
                .map_err(|e| QueueError::storage("creating queue schema", e))?;
        }
        Ok(())
    }

    fn row_to_record(row: &Row) -> QueueResult<JobRecord> {
        let read = |e: libsql::Error| QueueError::storage("reading job row", e);
        Ok(JobRecord::from_columns(
            row.get::<i64>(0).map_err(read)?,
            row.get::<String>(1).map_err(read)?,
            row.get::<String>(2).map_err(read)?,
            row.get::<i64>(3).map_err(read)?,
            row.get::<Option<i64>>(4).map_err(read)?,
            row.get::<i64>(5).map_err(read)?,
        ))
    }
}

/// The encryption key travels as a `remoteEncryptionKey` query parameter, the
/// form Turso endpoints accept from the Go driver. The Rust client forwards
/// the URL as given and does not interpret the key itself. The auth token is
/// handed to the client separately so it never ends up in the URL.
fn endpoint_url(config: &RemoteConfig) -> String {
    match &config.encryption_key {
        Some(key) => {
            let sep = if config.url.contains('?') { '&' } else { '?' };
            format!("{}{}remoteEncryptionKey={}", config.url, sep, key)
        }
        None => config.url.clone(),
    }
}

#[async_trait]
impl RowStore for RemoteStore {
    async fn insert(&self, payload: &str) -> QueueResult<JobId> {
        let mut rows = self
            .conn
            .query(schema::INSERT_JOB, params![payload])
            .await
            .map_err(|e| QueueError::storage("inserting job", e))?;

        let row = rows
            .next()
            .await
            .map_err(|e| QueueError::storage("inserting job", e))?
            .ok_or_else(|| QueueError::storage("inserting job", "insert returned no id"))?;
        let id = row
            .get::<i64>(0)
            .map_err(|e| QueueError::storage("inserting job", e))?;

        Ok(JobId(id))
    }

    async fn try_claim(&self, max_retries: u32, lease: Duration) -> QueueResult<ClaimAttempt> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| QueueError::storage("beginning claim transaction", e))?;

        let candidate = {
            let mut rows = tx
                .query(schema::SELECT_CANDIDATE, params![i64::from(max_retries)])
                .await
                .map_err(|e| QueueError::storage("selecting next job", e))?;
            match rows
                .next()
                .await
                .map_err(|e| QueueError::storage("selecting next job", e))?
            {
                Some(row) => Some(
                    row.get::<i64>(0)
                        .map_err(|e| QueueError::storage("selecting next job", e))?,
                ),
                None => None,
            }
        };

        let Some(candidate) = candidate else {
            tx.rollback()
                .await
                .map_err(|e| QueueError::storage("rolling back claim transaction", e))?;
            return Ok(ClaimAttempt::Empty);
        };

        let claimed = {
            let mut rows = tx
                .query(
                    schema::CLAIM_CANDIDATE,
                    params![duration_millis(lease), candidate, i64::from(max_retries)],
                )
                .await
                .map_err(|e| QueueError::storage("claiming job", e))?;
            match rows
                .next()
                .await
                .map_err(|e| QueueError::storage("claiming job", e))?
            {
                Some(row) => Some(Self::row_to_record(&row)?),
                None => None,
            }
        };

        match claimed {
            Some(record) => {
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
        self.conn
            .execute(schema::DELETE_JOB, params![id.get()])
            .await
            .map_err(|e| QueueError::storage("acking job", e))?;
        Ok(())
    }

    async fn nack(&self, id: JobId, delay: Duration) -> QueueResult<()> {
        self.conn
            .execute(schema::NACK_JOB, params![duration_millis(delay), id.get()])
            .await
            .map_err(|e| QueueError::storage("nacking job", e))?;
        Ok(())
    }

    async fn size(&self, max_retries: u32) -> QueueResult<u64> {
        let mut rows = self
            .conn
            .query(schema::COUNT_LIVE, params![i64::from(max_retries)])
            .await
            .map_err(|e| QueueError::storage("counting jobs", e))?;

        let count = match rows
            .next()
            .await
            .map_err(|e| QueueError::storage("counting jobs", e))?
        {
            Some(row) => row
                .get::<i64>(0)
                .map_err(|e| QueueError::storage("counting jobs", e))?,
            None => 0,
        };

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn reclaim_expired(&self) -> QueueResult<Vec<JobId>> {
        let mut rows = self
            .conn
            .query(schema::RECLAIM_EXPIRED, ())
            .await
            .map_err(|e| QueueError::storage("reclaiming expired leases", e))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| QueueError::storage("reclaiming expired leases", e))?
        {
            let id = row
                .get::<i64>(0)
                .map_err(|e| QueueError::storage("reclaiming expired leases", e))?;
            ids.push(JobId(id));
        }

        Ok(ids)
    }

    async fn record(&self, id: JobId) -> QueueResult<Option<JobRecord>> {
        let mut rows = self
            .conn
            .query(schema::SELECT_RECORD, params![id.get()])
            .await
            .map_err(|e| QueueError::storage("reading job", e))?;

        match rows
            .next()
            .await
            .map_err(|e| QueueError::storage("reading job", e))?
        {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    fn location(&self) -> &str {
        &self.location
    }
}
