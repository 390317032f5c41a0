//! # Sync Orchestrator
//!
//! Drives one sync pass: drains the change feed for each selected
//! library, classifies every entry against the ledger, and applies the
//! outcome to documents, blobs, and the event trail.
//!
//! Classification for a live file entry, in order:
//!
//! 1. deletion tombstone, applied whether or not the path is in scope
//! 2. folders are structure, not content
//! 3. scope: an in-ledger item whose new path falls out of scope is a
//!    removal; a never-seen out-of-scope item is ignored
//! 4. eligibility (extension, size) skips without touching the ledger
//! 5. add, move, modify, or unchanged against the existing row
//!
//! Per-item failures are recorded on the run and do not abort the pass;
//! feed-level failures fail the whole run.

use crate::error::{Result, SyncError};
use crate::filter::SyncFilter;
use core_library::models::{
    Document, EventType, NewDocument, NewSyncEvent, RunCounters, SyncRun,
};
use core_library::repositories::{
    DeltaTokenRepository, DocumentRepository, SqliteDeltaTokenRepository,
    SqliteDocumentRepository, SqliteSyncEventRepository, SqliteSyncRunRepository,
    SyncEventRepository, SyncRunRepository,
};
use core_library::{models::now_rfc3339, LibraryError};
use core_runtime::MirrorConfig;
use core_storage::BlobStore;
use provider_sharepoint::feed::{ChangeFeed, Drive, DriveItem};
use provider_sharepoint::quickxorhash;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Per-invocation options for a sync pass
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Discard delta cursors and re-enumerate everything
    pub full_sync: bool,
    /// Classify and count without downloading or persisting anything
    /// beyond the run record itself
    pub dry_run: bool,
    /// Override the configured library for this pass
    pub library: Option<String>,
}

/// Snapshot of the mirror's state for status surfaces
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub is_running: bool,
    pub current_run: Option<SyncRun>,
    /// Most recent completed or failed run
    pub last_run: Option<SyncRun>,
    pub document_count: i64,
    pub total_document_size: i64,
    pub blob_count: i64,
    pub total_blob_size: i64,
}

/// The sync state machine. One instance per mirror; `run` is the only
/// mutating entry point and the persistent single-running invariant is
/// the sole mutual exclusion.
pub struct SyncOrchestrator {
    config: MirrorConfig,
    feed: Arc<dyn ChangeFeed>,
    store: Arc<BlobStore>,
    documents: SqliteDocumentRepository,
    runs: SqliteSyncRunRepository,
    events: SqliteSyncEventRepository,
    tokens: SqliteDeltaTokenRepository,
    filter: SyncFilter,
}

impl SyncOrchestrator {
    pub fn new(
        config: MirrorConfig,
        feed: Arc<dyn ChangeFeed>,
        pool: SqlitePool,
        store: Arc<BlobStore>,
    ) -> Result<Self> {
        config.validate()?;
        let filter = SyncFilter::new(&config)?;

        Ok(Self {
            config,
            feed,
            store,
            documents: SqliteDocumentRepository::new(pool.clone()),
            runs: SqliteSyncRunRepository::new(pool.clone()),
            events: SqliteSyncEventRepository::new(pool.clone()),
            tokens: SqliteDeltaTokenRepository::new(pool),
            filter,
        })
    }

    /// Execute one sync pass and return the finished run record.
    ///
    /// # Errors
    ///
    /// - `RunInProgress` if another run holds the running slot; no row is
    ///   created
    /// - `DriveNotFound` if an explicitly requested library does not
    ///   exist; raised before any run row is created
    /// - Feed, storage, and ledger errors fail the run after recording it
    #[instrument(skip(self), fields(full_sync = options.full_sync, dry_run = options.dry_run))]
    pub async fn run(&self, options: SyncOptions) -> Result<SyncRun> {
        // A library named per-invocation is resolved before the run row
        // exists, so a typo does not burn a run record. The configured
        // library is resolved inside the run and fails it instead.
        let pre_resolved = match &options.library {
            Some(name) => Some(self.resolve_drives(Some(name)).await?),
            None => None,
        };

        let run = self.runs.begin(options.full_sync).await?;
        info!(run_id = run.id, "Sync run started");

        let mut counters = RunCounters::default();
        match self
            .execute(run.id, pre_resolved, &options, &mut counters)
            .await
        {
            Ok(()) => {
                self.runs.complete(run.id, &counters).await?;
                info!(
                    run_id = run.id,
                    added = counters.files_added,
                    modified = counters.files_modified,
                    removed = counters.files_removed,
                    unchanged = counters.files_unchanged,
                    skipped = counters.files_skipped,
                    bytes = counters.bytes_downloaded,
                    errors = counters.errors.len(),
                    "Sync run completed"
                );
            }
            Err(e) => {
                warn!(run_id = run.id, error = %e, "Sync run failed");
                if let Err(mark_err) = self.runs.fail(run.id, &counters, &e.to_string()).await {
                    warn!(run_id = run.id, error = %mark_err, "Failed to mark run as failed");
                }
                return Err(e);
            }
        }

        self.runs
            .find_by_id(run.id)
            .await?
            .ok_or_else(|| {
                SyncError::Library(LibraryError::NotFound {
                    entity_type: "SyncRun".to_string(),
                    id: run.id.to_string(),
                })
            })
    }

    async fn execute(
        &self,
        run_id: i64,
        pre_resolved: Option<Vec<Drive>>,
        options: &SyncOptions,
        counters: &mut RunCounters,
    ) -> Result<()> {
        let drives = match pre_resolved {
            Some(drives) => drives,
            None => {
                self.resolve_drives(self.config.library_name.as_deref())
                    .await?
            }
        };

        if options.full_sync && !options.dry_run {
            let cleared = self.tokens.delete_all().await?;
            info!(cleared, "Full sync requested, delta cursors discarded");
        }

        for drive in &drives {
            let stored_link = if options.full_sync {
                None
            } else {
                self.tokens.get(&drive.id).await?.map(|t| t.delta_link)
            };

            let (items, next_link) = self
                .feed
                .list_changes(&drive.id, stored_link.as_deref())
                .await?;
            info!(drive = %drive.name, items = items.len(), "Change feed drained");

            for item in &items {
                if let Err(e) = self.process_item(run_id, drive, item, options, counters).await {
                    warn!(path = %item.path, error = %e, "Item failed");
                    counters.errors.push(format!("{}: {}", item.path, e));
                }
            }

            // The cursor covers everything above; persisting it earlier
            // could silently drop entries after a crash
            if !options.dry_run {
                self.tokens.upsert(&drive.id, &next_link).await?;
            }
        }

        Ok(())
    }

    async fn resolve_drives(&self, library: Option<&str>) -> Result<Vec<Drive>> {
        match library {
            Some(name) => {
                let drive = self
                    .feed
                    .drive_by_name(name)
                    .await?
                    .ok_or_else(|| SyncError::DriveNotFound(name.to_string()))?;
                Ok(vec![drive])
            }
            None => Ok(self.feed.list_drives().await?),
        }
    }

    async fn process_item(
        &self,
        run_id: i64,
        drive: &Drive,
        item: &DriveItem,
        options: &SyncOptions,
        counters: &mut RunCounters,
    ) -> Result<()> {
        let existing = self
            .documents
            .find_by_natural_key(&item.id, &drive.id)
            .await?;

        if item.is_deleted {
            return self
                .apply_remove(run_id, existing, options, counters)
                .await;
        }

        if item.is_folder {
            return Ok(());
        }

        if !self.filter.in_scope(&item.path) {
            if existing.as_ref().is_some_and(|d| !d.is_deleted) {
                debug!(path = %item.path, "Item moved out of scope");
                return self
                    .apply_remove(run_id, existing, options, counters)
                    .await;
            }
            debug!(path = %item.path, "Out-of-scope item ignored");
            return Ok(());
        }

        if !self.filter.is_eligible(&item.name, item.size) {
            counters.files_skipped += 1;
            return Ok(());
        }

        match existing {
            None => self.apply_add(run_id, drive, item, None, options, counters).await,
            Some(doc) if doc.is_deleted => {
                // A reappearing natural key resurrects its original row
                self.apply_add(run_id, drive, item, Some(doc), options, counters)
                    .await
            }
            Some(doc) => {
                self.apply_existing(run_id, drive, item, doc, options, counters)
                    .await
            }
        }
    }

    /// Soft-delete the ledger row behind a tombstone or an out-of-scope
    /// move. A tombstone with no live row is a silent no-op.
    async fn apply_remove(
        &self,
        run_id: i64,
        existing: Option<Document>,
        options: &SyncOptions,
        counters: &mut RunCounters,
    ) -> Result<()> {
        let Some(doc) = existing.filter(|d| !d.is_deleted) else {
            debug!("Deletion for unknown or already-deleted item ignored");
            return Ok(());
        };

        counters.files_removed += 1;
        if options.dry_run {
            return Ok(());
        }

        self.documents.soft_delete(doc.id).await?;

        // The blob stays referenced so removed content remains auditable
        self.events
            .append(&NewSyncEvent {
                sync_run_id: run_id,
                event_type: EventType::Remove,
                sharepoint_item_id: doc.sharepoint_item_id.clone(),
                name: doc.name.clone(),
                path: doc.path.clone(),
                document_id: Some(doc.id),
                file_size: Some(doc.file_size),
                file_blob_id: doc.file_blob_id,
            })
            .await?;

        info!(path = %doc.path, "Document removed");
        Ok(())
    }

    /// Insert a new document, or resurrect a soft-deleted row for a
    /// reappearing item.
    async fn apply_add(
        &self,
        run_id: i64,
        drive: &Drive,
        item: &DriveItem,
        resurrect: Option<Document>,
        options: &SyncOptions,
        counters: &mut RunCounters,
    ) -> Result<()> {
        if options.dry_run {
            counters.files_added += 1;
            return Ok(());
        }

        let blob_id = if self.config.metadata_only {
            None
        } else {
            let content = self.fetch_content(drive, item).await?;
            counters.bytes_downloaded += content.len() as i64;
            let mime = item
                .mime_type
                .clone()
                .or_else(|| sniff_mime(&content).map(str::to_string));
            Some(self.store.store(&content, mime.as_deref()).await?.id)
        };

        let document_id = match resurrect {
            None => {
                let doc = self
                    .documents
                    .insert(&NewDocument {
                        sharepoint_item_id: item.id.clone(),
                        sharepoint_drive_id: drive.id.clone(),
                        name: item.name.clone(),
                        path: item.path.clone(),
                        mime_type: item.mime_type.clone(),
                        file_size: item.size,
                        web_url: item.web_url.clone(),
                        created_by: item.created_by.clone(),
                        last_modified_by: item.last_modified_by.clone(),
                        sharepoint_created_at: item.created_at.clone(),
                        sharepoint_modified_at: item.modified_at.clone(),
                        quickxor_hash: item.quickxor_hash.clone(),
                        file_blob_id: blob_id,
                    })
                    .await?;
                doc.id
            }
            Some(mut doc) => {
                Self::overlay_metadata(&mut doc, item);
                doc.is_deleted = false;
                doc.file_blob_id = blob_id;
                self.documents.update(&doc).await?;
                doc.id
            }
        };

        self.events
            .append(&NewSyncEvent {
                sync_run_id: run_id,
                event_type: EventType::Add,
                sharepoint_item_id: item.id.clone(),
                name: item.name.clone(),
                path: item.path.clone(),
                document_id: Some(document_id),
                file_size: Some(item.size),
                file_blob_id: blob_id,
            })
            .await?;

        counters.files_added += 1;
        info!(path = %item.path, "Document added");
        Ok(())
    }

    /// Classify an item that already has a live ledger row.
    async fn apply_existing(
        &self,
        run_id: i64,
        drive: &Drive,
        item: &DriveItem,
        doc: Document,
        options: &SyncOptions,
        counters: &mut RunCounters,
    ) -> Result<()> {
        let path_changed = doc.path != item.path || doc.name != item.name;
        let timestamp_changed =
            doc.sharepoint_modified_at.as_deref() != item.modified_at.as_deref();

        if !path_changed && !timestamp_changed {
            counters.files_unchanged += 1;
            return Ok(());
        }

        if path_changed && !timestamp_changed {
            return self
                .apply_move(run_id, item, doc, options, counters)
                .await;
        }

        // Timestamp changed; any path change rides along with the
        // content check so the item is counted exactly once
        self.apply_modify(run_id, drive, item, doc, options, counters)
            .await
    }

    /// Pure rename or move: same content, new location. Counted as one
    /// modification with a paired event showing both locations.
    async fn apply_move(
        &self,
        run_id: i64,
        item: &DriveItem,
        mut doc: Document,
        options: &SyncOptions,
        counters: &mut RunCounters,
    ) -> Result<()> {
        counters.files_modified += 1;
        if options.dry_run {
            return Ok(());
        }

        let old_name = doc.name.clone();
        let old_path = doc.path.clone();

        Self::overlay_metadata(&mut doc, item);
        self.documents.update(&doc).await?;

        self.append_modify_pair(
            run_id,
            item,
            doc.id,
            &old_name,
            &old_path,
            doc.file_blob_id,
            doc.file_blob_id,
            doc.file_size,
            item.size,
        )
        .await?;

        info!(from = %old_path, to = %item.path, "Document moved");
        Ok(())
    }

    /// Timestamp-changed item: download, compare content, and either
    /// refresh metadata (content identical) or swap in a new blob.
    async fn apply_modify(
        &self,
        run_id: i64,
        drive: &Drive,
        item: &DriveItem,
        mut doc: Document,
        options: &SyncOptions,
        counters: &mut RunCounters,
    ) -> Result<()> {
        if options.dry_run {
            counters.files_modified += 1;
            return Ok(());
        }

        if self.config.metadata_only {
            // Nothing to compare without content; the timestamp change
            // is the modification
            let old_name = doc.name.clone();
            let old_path = doc.path.clone();
            let old_size = doc.file_size;

            Self::overlay_metadata(&mut doc, item);
            self.documents.update(&doc).await?;

            self.append_modify_pair(
                run_id, item, doc.id, &old_name, &old_path, None, None, old_size, item.size,
            )
            .await?;

            counters.files_modified += 1;
            return Ok(());
        }

        let content = self.fetch_content(drive, item).await?;
        counters.bytes_downloaded += content.len() as i64;
        let new_hash = BlobStore::hash_content(&content);

        let current_hash = match doc.file_blob_id {
            Some(id) => self.store.find_by_id(id).await?.map(|b| b.sha256_hash),
            None => None,
        };

        if current_hash.as_deref() == Some(new_hash.as_str()) {
            // Metadata-only update upstream (rename, property edit);
            // reclassified as unchanged
            Self::overlay_metadata(&mut doc, item);
            self.documents.update(&doc).await?;
            counters.files_unchanged += 1;
            debug!(path = %item.path, "Content identical, metadata refreshed");
            return Ok(());
        }

        let old_name = doc.name.clone();
        let old_path = doc.path.clone();
        let old_blob_id = doc.file_blob_id;
        let old_size = doc.file_size;

        let mime = item
            .mime_type
            .clone()
            .or_else(|| sniff_mime(&content).map(str::to_string));
        let blob = self.store.store(&content, mime.as_deref()).await?;

        // The superseded blob keeps its reference: the modify_remove
        // event still points at retrievable content
        Self::overlay_metadata(&mut doc, item);
        doc.file_blob_id = Some(blob.id);
        self.documents.update(&doc).await?;

        self.append_modify_pair(
            run_id,
            item,
            doc.id,
            &old_name,
            &old_path,
            old_blob_id,
            Some(blob.id),
            old_size,
            item.size,
        )
        .await?;

        counters.files_modified += 1;
        info!(path = %item.path, "Document modified");
        Ok(())
    }

    /// Append the `modify_remove`/`modify_add` pair for a modification
    #[allow(clippy::too_many_arguments)]
    async fn append_modify_pair(
        &self,
        run_id: i64,
        item: &DriveItem,
        document_id: i64,
        old_name: &str,
        old_path: &str,
        old_blob_id: Option<i64>,
        new_blob_id: Option<i64>,
        old_size: i64,
        new_size: i64,
    ) -> Result<()> {
        self.events
            .append(&NewSyncEvent {
                sync_run_id: run_id,
                event_type: EventType::ModifyRemove,
                sharepoint_item_id: item.id.clone(),
                name: old_name.to_string(),
                path: old_path.to_string(),
                document_id: Some(document_id),
                file_size: Some(old_size),
                file_blob_id: old_blob_id,
            })
            .await?;

        self.events
            .append(&NewSyncEvent {
                sync_run_id: run_id,
                event_type: EventType::ModifyAdd,
                sharepoint_item_id: item.id.clone(),
                name: item.name.clone(),
                path: item.path.clone(),
                document_id: Some(document_id),
                file_size: Some(new_size),
                file_blob_id: new_blob_id,
            })
            .await?;

        Ok(())
    }

    /// Download an item's content, optionally cross-checking the remote
    /// QuickXorHash. A mismatch is logged, never fatal: the remote hash
    /// may describe a newer version than the bytes we just fetched.
    async fn fetch_content(&self, drive: &Drive, item: &DriveItem) -> Result<bytes::Bytes> {
        let content = self.feed.download(&drive.id, item).await?;

        if self.config.verify_quickxor_hash {
            if let Some(expected) = &item.quickxor_hash {
                let actual = quickxorhash::hash_base64(&content);
                if actual != *expected {
                    warn!(
                        path = %item.path,
                        expected = %expected,
                        actual = %actual,
                        "QuickXorHash mismatch on downloaded content"
                    );
                }
            }
        }

        Ok(content)
    }

    /// Copy remote metadata onto the ledger row and stamp `synced_at`
    fn overlay_metadata(doc: &mut Document, item: &DriveItem) {
        doc.name = item.name.clone();
        doc.path = item.path.clone();
        doc.mime_type = item.mime_type.clone().or(doc.mime_type.take());
        doc.file_size = item.size;
        doc.web_url = item.web_url.clone().or(doc.web_url.take());
        doc.created_by = item.created_by.clone().or(doc.created_by.take());
        doc.last_modified_by = item.last_modified_by.clone().or(doc.last_modified_by.take());
        doc.sharepoint_created_at = item.created_at.clone().or(doc.sharepoint_created_at.take());
        doc.sharepoint_modified_at = item.modified_at.clone();
        doc.quickxor_hash = item.quickxor_hash.clone();
        doc.synced_at = now_rfc3339();
    }

    /// Mirror state snapshot for status surfaces
    pub async fn status(&self) -> Result<SyncStatus> {
        let current_run = self.runs.running().await?;
        let last_run = self
            .runs
            .recent(20)
            .await?
            .into_iter()
            .find(|r| r.status != "running");

        Ok(SyncStatus {
            is_running: current_run.is_some(),
            current_run,
            last_run,
            document_count: self.documents.count_active().await?,
            total_document_size: self.documents.total_active_size().await?,
            blob_count: self.store.count().await?,
            total_blob_size: self.store.total_size().await?,
        })
    }

    /// Discard every delta cursor, forcing the next run to enumerate all
    /// drives from scratch. Returns the number of cursors removed.
    pub async fn clear_delta_tokens(&self) -> Result<u64> {
        let cleared = self.tokens.delete_all().await?;
        info!(cleared, "Delta cursors cleared");
        Ok(cleared)
    }

    /// Reclassify runs left `running` by a crashed process as failed
    pub async fn recover_interrupted(&self) -> Result<u64> {
        Ok(self.runs.recover_interrupted().await?)
    }

    /// Verify remote credentials and site reachability
    pub async fn test_connection(&self) -> Result<()> {
        Ok(self.feed.test_connection().await?)
    }
}

/// Minimal magic-byte MIME sniffer, used only when the feed reports no
/// MIME type for an item.
fn sniff_mime(content: &[u8]) -> Option<&'static str> {
    match content {
        [0x25, 0x50, 0x44, 0x46, ..] => Some("application/pdf"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'P', b'K', 0x03, 0x04, ..] => Some("application/zip"),
        _ => None,
    }
}
