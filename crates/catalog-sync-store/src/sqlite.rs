//! SQLite implementation of the storage traits.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use catalog_sync_core::{ChannelId, EntityId, Job, JobId, JobKind, JobPayload, SyncRecord};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{JobStore, SyncLedger};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Opening sync store at {}", path.display());
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

/// Raw `jobs` row, decoded into a [`Job`] outside the rusqlite closure.
struct JobRow {
    job_id: i64,
    kind: String,
    channel_id: String,
    payload: String,
    dispatched: bool,
    created_at: i64,
}

const JOB_COLUMNS: &str = "job_id, kind, channel_id, payload, dispatched, created_at";

fn row_to_job_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRow> {
    Ok(JobRow {
        job_id: row.get("job_id")?,
        kind: row.get("kind")?,
        channel_id: row.get("channel_id")?,
        payload: row.get("payload")?,
        dispatched: row.get("dispatched")?,
        created_at: row.get("created_at")?,
    })
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let id = u64::try_from(self.job_id)
            .map_err(|_| StoreError::InvalidData(format!("negative job id {}", self.job_id)))?;
        Ok(Job {
            id: JobId(id),
            kind: JobKind::new(self.kind),
            channel: ChannelId::new(self.channel_id),
            payload: JobPayload::from_json(&self.payload)?,
            dispatched: self.dispatched,
            created_at: self.created_at,
        })
    }
}

fn job_id_param(id: JobId) -> Result<i64> {
    i64::try_from(id.0).map_err(|_| StoreError::JobNotFound(id))
}

#[async_trait]
impl SyncLedger for SqliteStore {
    async fn filter_unsynced(
        &self,
        ids: &[EntityId],
        channel: &ChannelId,
    ) -> Result<Vec<EntityId>> {
        let ids = ids.to_vec();
        let channel = channel.clone();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT pending_since IS NOT NULL FROM sync_records
                 WHERE entity_id = ?1 AND channel_id = ?2",
            )?;

            let mut unsynced = Vec::with_capacity(ids.len());
            for id in ids {
                let pending: Option<bool> = stmt
                    .query_row(params![id.as_str(), channel.as_str()], |row| row.get(0))
                    .optional()?;
                if pending != Some(true) {
                    unsynced.push(id);
                }
            }
            Ok(unsynced)
        })
        .await
    }

    async fn mark_pending(&self, ids: &[EntityId], channel: &ChannelId, now: i64) -> Result<()> {
        let ids = ids.to_vec();
        let channel = channel.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO sync_records (entity_id, channel_id, pending_since)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(entity_id, channel_id) DO UPDATE SET
                        pending_since = COALESCE(sync_records.pending_since, excluded.pending_since)",
                )?;
                for id in &ids {
                    stmt.execute(params![id.as_str(), channel.as_str(), now])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn mark_synced(&self, ids: &[EntityId], channel: &ChannelId, at: i64) -> Result<()> {
        let ids = ids.to_vec();
        let channel = channel.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO sync_records (entity_id, channel_id, pending_since, last_synced_at)
                     VALUES (?1, ?2, NULL, ?3)
                     ON CONFLICT(entity_id, channel_id) DO UPDATE SET
                        pending_since = NULL,
                        last_synced_at = excluded.last_synced_at",
                )?;
                for id in &ids {
                    stmt.execute(params![id.as_str(), channel.as_str(), at])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_record(&self, id: &EntityId, channel: &ChannelId) -> Result<Option<SyncRecord>> {
        let id = id.clone();
        let channel = channel.clone();

        self.blocking(move |conn| {
            let row: Option<(Option<i64>, Option<i64>)> = conn
                .query_row(
                    "SELECT pending_since, last_synced_at FROM sync_records
                     WHERE entity_id = ?1 AND channel_id = ?2",
                    params![id.as_str(), channel.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            Ok(row.map(|(pending_since, last_synced_at)| SyncRecord {
                entity: id,
                channel,
                pending_since,
                last_synced_at,
            }))
        })
        .await
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn latest_pending(&self, kind: &JobKind, channel: &ChannelId) -> Result<Option<Job>> {
        let kind = kind.clone();
        let channel = channel.clone();

        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {JOB_COLUMNS} FROM jobs
                         WHERE kind = ?1 AND channel_id = ?2 AND dispatched = 0
                         ORDER BY job_id DESC LIMIT 1"
                    ),
                    params![kind.as_str(), channel.as_str()],
                    row_to_job_row,
                )
                .optional()?;
            row.map(JobRow::into_job).transpose()
        })
        .await
    }

    async fn create_job(
        &self,
        kind: &JobKind,
        channel: &ChannelId,
        payload: JobPayload,
        now: i64,
    ) -> Result<Job> {
        let kind = kind.clone();
        let channel = channel.clone();

        self.blocking(move |conn| {
            let json = payload.to_json()?;
            conn.execute(
                "INSERT INTO jobs (kind, channel_id, payload, dispatched, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4)",
                params![kind.as_str(), channel.as_str(), json, now],
            )?;
            let id = u64::try_from(conn.last_insert_rowid())
                .map_err(|_| StoreError::InvalidData("negative rowid".into()))?;

            Ok(Job {
                id: JobId(id),
                kind,
                channel,
                payload,
                dispatched: false,
                created_at: now,
            })
        })
        .await
    }

    async fn edit_job(&self, job: &Job, payload: JobPayload) -> Result<Job> {
        let mut job = job.clone();

        self.blocking(move |conn| {
            let json = payload.to_json()?;
            // Compare-and-swap on the dispatched flag.
            let changed = conn.execute(
                "UPDATE jobs SET payload = ?2, updated_at = ?3
                 WHERE job_id = ?1 AND dispatched = 0",
                params![job_id_param(job.id)?, json, now_millis()],
            )?;
            if changed == 0 {
                return Err(StoreError::StaleJob(job.id));
            }

            job.payload = payload;
            job.dispatched = false;
            Ok(job)
        })
        .await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = ?1"),
                    params![job_id_param(id)?],
                    row_to_job_row,
                )
                .optional()?;
            row.map(JobRow::into_job).transpose()
        })
        .await
    }

    async fn list_jobs(&self, kind: &JobKind, channel: &ChannelId) -> Result<Vec<Job>> {
        let kind = kind.clone();
        let channel = channel.clone();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs
                 WHERE kind = ?1 AND channel_id = ?2
                 ORDER BY job_id"
            ))?;
            let rows = stmt
                .query_map(params![kind.as_str(), channel.as_str()], row_to_job_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(JobRow::into_job).collect()
        })
        .await
    }

    async fn mark_dispatched(&self, id: JobId) -> Result<()> {
        self.blocking(move |conn| {
            let job_id = job_id_param(id)?;
            // Compare-and-swap: only one claimant flips the flag.
            let changed = conn.execute(
                "UPDATE jobs SET dispatched = 1, updated_at = ?2
                 WHERE job_id = ?1 AND dispatched = 0",
                params![job_id, now_millis()],
            )?;
            if changed == 0 {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM jobs WHERE job_id = ?1)",
                    params![job_id],
                    |row| row.get(0),
                )?;
                return Err(if exists {
                    StoreError::StaleJob(id)
                } else {
                    StoreError::JobNotFound(id)
                });
            }
            Ok(())
        })
        .await
    }

    async fn complete_job(&self, id: JobId) -> Result<()> {
        self.blocking(move |conn| {
            let changed =
                conn.execute("DELETE FROM jobs WHERE job_id = ?1", params![job_id_param(id)?])?;
            if changed == 0 {
                return Err(StoreError::JobNotFound(id));
            }
            Ok(())
        })
        .await
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
