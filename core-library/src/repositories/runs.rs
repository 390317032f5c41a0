//! Sync run repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{now_rfc3339, RunCounters, RunStatus, SyncRun};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};
use tracing::warn;

/// Sync run repository interface for data access operations
#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Start a new run in `running` state.
    ///
    /// The schema allows at most one running row, so this doubles as the
    /// mutual-exclusion check for concurrent runs.
    ///
    /// # Errors
    /// Returns `RunInProgress` if another run is already running
    async fn begin(&self, is_full_sync: bool) -> Result<SyncRun>;

    /// Mark a run completed and write its final counters
    async fn complete(&self, id: i64, counters: &RunCounters) -> Result<()>;

    /// Mark a run failed with an error message, preserving whatever
    /// counters were accumulated before the failure
    async fn fail(&self, id: i64, counters: &RunCounters, message: &str) -> Result<()>;

    /// Find a run by id
    async fn find_by_id(&self, id: i64) -> Result<Option<SyncRun>>;

    /// The most recently started run, regardless of status
    async fn latest(&self) -> Result<Option<SyncRun>>;

    /// The currently running run, if any
    async fn running(&self) -> Result<Option<SyncRun>>;

    /// Most recent runs, newest first
    async fn recent(&self, limit: i64) -> Result<Vec<SyncRun>>;

    /// Mark any run left in `running` state by a crashed process as
    /// failed. Returns the number of rows repaired.
    async fn recover_interrupted(&self) -> Result<u64>;
}

/// SQLite implementation of SyncRunRepository
pub struct SqliteSyncRunRepository {
    pool: SqlitePool,
}

impl SqliteSyncRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    async fn begin(&self, is_full_sync: bool) -> Result<SyncRun> {
        let result = query(
            "INSERT INTO sync_runs (status, started_at, is_full_sync) VALUES ('running', ?, ?)",
        )
        .bind(now_rfc3339())
        .bind(is_full_sync)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(LibraryError::RunInProgress);
            }
            Err(e) => return Err(e.into()),
        };

        let id = result.last_insert_rowid();

        self.find_by_id(id).await?.ok_or(LibraryError::NotFound {
            entity_type: "SyncRun".to_string(),
            id: id.to_string(),
        })
    }

    async fn complete(&self, id: i64, counters: &RunCounters) -> Result<()> {
        let result = query(
            r#"
            UPDATE sync_runs
            SET status = ?, completed_at = ?, files_added = ?, files_modified = ?,
                files_removed = ?, files_unchanged = ?, files_skipped = ?,
                bytes_downloaded = ?, error_message = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(RunStatus::Completed.as_str())
        .bind(now_rfc3339())
        .bind(counters.files_added)
        .bind(counters.files_modified)
        .bind(counters.files_removed)
        .bind(counters.files_unchanged)
        .bind(counters.files_skipped)
        .bind(counters.bytes_downloaded)
        .bind(counters.error_message())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "SyncRun".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn fail(&self, id: i64, counters: &RunCounters, message: &str) -> Result<()> {
        let result = query(
            r#"
            UPDATE sync_runs
            SET status = ?, completed_at = ?, files_added = ?, files_modified = ?,
                files_removed = ?, files_unchanged = ?, files_skipped = ?,
                bytes_downloaded = ?, error_message = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(RunStatus::Failed.as_str())
        .bind(now_rfc3339())
        .bind(counters.files_added)
        .bind(counters.files_modified)
        .bind(counters.files_removed)
        .bind(counters.files_unchanged)
        .bind(counters.files_skipped)
        .bind(counters.bytes_downloaded)
        .bind(message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "SyncRun".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<SyncRun>> {
        let run = query_as::<_, SyncRun>("SELECT * FROM sync_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(run)
    }

    async fn latest(&self) -> Result<Option<SyncRun>> {
        let run = query_as::<_, SyncRun>("SELECT * FROM sync_runs ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(run)
    }

    async fn running(&self) -> Result<Option<SyncRun>> {
        let run = query_as::<_, SyncRun>("SELECT * FROM sync_runs WHERE status = 'running'")
            .fetch_optional(&self.pool)
            .await?;

        Ok(run)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<SyncRun>> {
        let runs = query_as::<_, SyncRun>("SELECT * FROM sync_runs ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(runs)
    }

    async fn recover_interrupted(&self) -> Result<u64> {
        let result = query(
            "UPDATE sync_runs SET status = 'failed', completed_at = ?, \
             error_message = 'Interrupted by process restart' WHERE status = 'running'",
        )
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;

        let repaired = result.rows_affected();
        if repaired > 0 {
            warn!(runs = repaired, "Recovered interrupted sync runs");
        }

        Ok(repaired)
    }
}
