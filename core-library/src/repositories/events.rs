//! Sync event repository trait and implementation

use crate::error::Result;
use crate::models::{now_rfc3339, NewSyncEvent, SyncEvent};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Sync event repository interface for the per-item audit trail
#[async_trait]
pub trait SyncEventRepository: Send + Sync {
    /// Append an event to the trail
    async fn append(&self, event: &NewSyncEvent) -> Result<()>;

    /// Events for one run, in insertion order
    async fn for_run(&self, sync_run_id: i64) -> Result<Vec<SyncEvent>>;
}

/// SQLite implementation of SyncEventRepository
pub struct SqliteSyncEventRepository {
    pool: SqlitePool,
}

impl SqliteSyncEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncEventRepository for SqliteSyncEventRepository {
    async fn append(&self, event: &NewSyncEvent) -> Result<()> {
        query(
            r#"
            INSERT INTO sync_events (
                sync_run_id, event_type, sharepoint_item_id, name, path,
                document_id, file_size, file_blob_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.sync_run_id)
        .bind(event.event_type.as_str())
        .bind(&event.sharepoint_item_id)
        .bind(&event.name)
        .bind(&event.path)
        .bind(event.document_id)
        .bind(event.file_size)
        .bind(event.file_blob_id)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn for_run(&self, sync_run_id: i64) -> Result<Vec<SyncEvent>> {
        let events = query_as::<_, SyncEvent>(
            "SELECT * FROM sync_events WHERE sync_run_id = ? ORDER BY id ASC",
        )
        .bind(sync_run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
