//! Integration tests for the sync orchestrator
//!
//! These tests drive full sync passes over a scripted change feed and
//! assert the resulting counters, ledger rows, blobs, and event trails:
//! - initial enumeration (adds)
//! - unchanged / renamed / content-modified / deleted classification
//! - content-identical updates reclassified as unchanged
//! - scope and eligibility handling
//! - dry-run suppression, mutual exclusion, crash recovery
//! - delta cursor persistence and full-sync behavior

use bytes::Bytes;
use core_library::db::create_test_pool;
use core_library::models::EventType;
use core_library::repositories::{
    DeltaTokenRepository, DocumentRepository, SqliteDeltaTokenRepository,
    SqliteDocumentRepository, SqliteSyncEventRepository, SqliteSyncRunRepository,
    SyncEventRepository, SyncRunRepository,
};
use core_runtime::MirrorConfig;
use core_storage::BlobStore;
use core_sync::{SyncError, SyncOptions, SyncOrchestrator};
use provider_sharepoint::feed::{ChangeFeed, Drive, DriveItem};
use provider_sharepoint::SharePointError;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex as AsyncMutex;

// ============================================================================
// Scripted Feed
// ============================================================================

/// Mock change feed replaying pre-scripted drain results. Each call to
/// `list_changes` consumes one script entry.
struct ScriptedFeed {
    drives: Vec<Drive>,
    pages: AsyncMutex<Vec<(Vec<DriveItem>, String)>>,
    content: AsyncMutex<HashMap<String, Bytes>>,
    downloads: AtomicUsize,
    seen_links: AsyncMutex<Vec<Option<String>>>,
}

impl ScriptedFeed {
    fn new() -> Self {
        Self {
            drives: vec![Drive {
                id: "drive-1".to_string(),
                name: "Documents".to_string(),
                web_url: None,
            }],
            pages: AsyncMutex::new(Vec::new()),
            content: AsyncMutex::new(HashMap::new()),
            downloads: AtomicUsize::new(0),
            seen_links: AsyncMutex::new(Vec::new()),
        }
    }

    async fn script(&self, items: Vec<DriveItem>, next_link: &str) {
        self.pages.lock().await.push((items, next_link.to_string()));
    }

    async fn set_content(&self, item_id: &str, content: &[u8]) {
        self.content
            .lock()
            .await
            .insert(item_id.to_string(), Bytes::copy_from_slice(content));
    }

    fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChangeFeed for ScriptedFeed {
    async fn list_drives(&self) -> provider_sharepoint::Result<Vec<Drive>> {
        Ok(self.drives.clone())
    }

    async fn list_changes(
        &self,
        _drive_id: &str,
        delta_link: Option<&str>,
    ) -> provider_sharepoint::Result<(Vec<DriveItem>, String)> {
        self.seen_links
            .lock()
            .await
            .push(delta_link.map(str::to_string));

        let mut pages = self.pages.lock().await;
        if pages.is_empty() {
            return Err(SharePointError::ApiError {
                status_code: 500,
                message: "script exhausted".to_string(),
            });
        }
        Ok(pages.remove(0))
    }

    async fn download(
        &self,
        _drive_id: &str,
        item: &DriveItem,
    ) -> provider_sharepoint::Result<Bytes> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.content
            .lock()
            .await
            .get(&item.id)
            .cloned()
            .ok_or_else(|| SharePointError::ItemNotFound {
                item_id: item.id.clone(),
            })
    }

    async fn test_connection(&self) -> provider_sharepoint::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    orchestrator: SyncOrchestrator,
    feed: Arc<ScriptedFeed>,
    pool: SqlitePool,
    store: Arc<BlobStore>,
    _blobs_dir: TempDir,
}

async fn harness_with(config: MirrorConfig) -> Harness {
    let pool = create_test_pool().await.unwrap();
    let blobs_dir = TempDir::new().unwrap();
    let store = Arc::new(BlobStore::new(pool.clone(), blobs_dir.path()));
    let feed = Arc::new(ScriptedFeed::new());

    let orchestrator = SyncOrchestrator::new(
        config,
        feed.clone() as Arc<dyn ChangeFeed>,
        pool.clone(),
        store.clone(),
    )
    .unwrap();

    Harness {
        orchestrator,
        feed,
        pool,
        store,
        _blobs_dir: blobs_dir,
    }
}

async fn harness() -> Harness {
    harness_with(MirrorConfig::default()).await
}

fn file_item(id: &str, path: &str, modified: &str) -> DriveItem {
    let name = path.rsplit('/').next().unwrap().to_string();
    DriveItem {
        id: id.to_string(),
        name,
        path: path.to_string(),
        size: 3,
        mime_type: Some("text/plain".to_string()),
        modified_at: Some(modified.to_string()),
        ..Default::default()
    }
}

fn tombstone(id: &str) -> DriveItem {
    DriveItem {
        id: id.to_string(),
        name: "gone".to_string(),
        path: "/gone".to_string(),
        is_deleted: true,
        ..Default::default()
    }
}

const T1: &str = "2024-01-01T00:00:00Z";
const T2: &str = "2024-02-01T00:00:00Z";

impl Harness {
    fn documents(&self) -> SqliteDocumentRepository {
        SqliteDocumentRepository::new(self.pool.clone())
    }

    fn runs(&self) -> SqliteSyncRunRepository {
        SqliteSyncRunRepository::new(self.pool.clone())
    }

    fn events(&self) -> SqliteSyncEventRepository {
        SqliteSyncEventRepository::new(self.pool.clone())
    }

    fn tokens(&self) -> SqliteDeltaTokenRepository {
        SqliteDeltaTokenRepository::new(self.pool.clone())
    }

    /// Script and run an initial pass seeding the given items
    async fn seed(&self, items: Vec<DriveItem>) {
        self.feed.script(items, "link-initial").await;
        self.orchestrator.run(SyncOptions::default()).await.unwrap();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_initial_sync_adds_documents() {
    let h = harness().await;
    h.feed.set_content("a", b"aaa").await;
    h.feed.set_content("b", b"bbb").await;
    h.feed
        .script(
            vec![
                file_item("a", "/Reports/a.txt", T1),
                file_item("b", "/Reports/b.txt", T1),
                DriveItem {
                    id: "dir".to_string(),
                    name: "Reports".to_string(),
                    path: "/Reports".to_string(),
                    is_folder: true,
                    ..Default::default()
                },
            ],
            "link-1",
        )
        .await;

    let run = h.orchestrator.run(SyncOptions::default()).await.unwrap();

    assert_eq!(run.status, "completed");
    assert_eq!(run.files_added, 2);
    assert_eq!(run.files_modified, 0);
    assert_eq!(run.files_removed, 0);
    assert_eq!(run.files_unchanged, 0);
    assert_eq!(run.files_skipped, 0);
    assert_eq!(run.bytes_downloaded, 6);

    let doc = h
        .documents()
        .find_by_natural_key("a", "drive-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.path, "/Reports/a.txt");
    assert!(doc.file_blob_id.is_some());

    assert_eq!(h.store.count().await.unwrap(), 2);

    let events = h.events().for_run(run.id).await.unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.event_type() == Some(EventType::Add)));

    let token = h.tokens().get("drive-1").await.unwrap().unwrap();
    assert_eq!(token.delta_link, "link-1");
}

#[tokio::test]
async fn test_classification_of_incremental_changes() {
    let h = harness().await;
    for (id, content) in [("a", "aaa"), ("b", "bbb"), ("c", "ccc"), ("d", "ddd")] {
        h.feed.set_content(id, content.as_bytes()).await;
    }
    h.seed(vec![
        file_item("a", "/docs/a.txt", T1),
        file_item("b", "/docs/b.txt", T1),
        file_item("c", "/docs/c.txt", T1),
        file_item("d", "/docs/d.txt", T1),
    ])
    .await;

    let downloads_after_seed = h.feed.download_count();
    h.feed.set_content("c", b"CCC").await;
    h.feed
        .script(
            vec![
                // untouched
                file_item("a", "/docs/a.txt", T1),
                // renamed, timestamp unchanged: pure move, no download
                file_item("b", "/archive/b.txt", T1),
                // new timestamp, new content
                file_item("c", "/docs/c.txt", T2),
                // deleted upstream
                tombstone("d"),
            ],
            "link-2",
        )
        .await;

    let run = h.orchestrator.run(SyncOptions::default()).await.unwrap();

    assert_eq!(run.files_unchanged, 1);
    assert_eq!(run.files_modified, 2);
    assert_eq!(run.files_removed, 1);
    assert_eq!(run.files_added, 0);
    assert_eq!(run.bytes_downloaded, 3);
    assert!(run.error_message.is_none());

    // Only the content-modified item was downloaded
    assert_eq!(h.feed.download_count() - downloads_after_seed, 1);

    // Rename applied in place
    let moved = h
        .documents()
        .find_by_natural_key("b", "drive-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.path, "/archive/b.txt");
    assert!(!moved.is_deleted);

    // The superseded blob for "c" keeps its reference
    assert_eq!(h.store.count().await.unwrap(), 5);

    // Tombstoned row survives as soft-deleted
    let removed = h
        .documents()
        .find_by_natural_key("d", "drive-1")
        .await
        .unwrap()
        .unwrap();
    assert!(removed.is_deleted);

    let events = h.events().for_run(run.id).await.unwrap();
    let kinds: Vec<_> = events.iter().filter_map(|e| e.event_type()).collect();
    assert_eq!(
        kinds,
        vec![
            EventType::ModifyRemove,
            EventType::ModifyAdd,
            EventType::ModifyRemove,
            EventType::ModifyAdd,
            EventType::Remove,
        ]
    );

    let token = h.tokens().get("drive-1").await.unwrap().unwrap();
    assert_eq!(token.delta_link, "link-2");
}

#[tokio::test]
async fn test_content_identical_update_is_unchanged() {
    let h = harness().await;
    h.feed.set_content("a", b"stable").await;
    h.seed(vec![file_item("a", "/a.txt", T1)]).await;

    // Timestamp changed upstream but the bytes did not
    h.feed.script(vec![file_item("a", "/a.txt", T2)], "link-2").await;
    let run = h.orchestrator.run(SyncOptions::default()).await.unwrap();

    assert_eq!(run.files_unchanged, 1);
    assert_eq!(run.files_modified, 0);
    assert_eq!(h.store.count().await.unwrap(), 1);

    // The metadata refresh still lands
    let doc = h
        .documents()
        .find_by_natural_key("a", "drive-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.sharepoint_modified_at.as_deref(), Some(T2));

    // No events for an unchanged item
    assert!(h.events().for_run(run.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_move_out_of_scope_is_removal() {
    let mut config = MirrorConfig::default();
    config.include_paths = vec!["/Keep".to_string()];
    let h = harness_with(config).await;

    h.feed.set_content("a", b"aaa").await;
    h.seed(vec![file_item("a", "/Keep/a.txt", T1)]).await;

    h.feed
        .script(
            vec![
                file_item("a", "/Elsewhere/a.txt", T1),
                // never-seen out-of-scope item is ignored entirely
                file_item("x", "/Elsewhere/x.txt", T1),
            ],
            "link-2",
        )
        .await;
    let run = h.orchestrator.run(SyncOptions::default()).await.unwrap();

    assert_eq!(run.files_removed, 1);
    assert_eq!(run.files_added + run.files_modified + run.files_unchanged, 0);

    let doc = h
        .documents()
        .find_by_natural_key("a", "drive-1")
        .await
        .unwrap()
        .unwrap();
    assert!(doc.is_deleted);

    assert!(h
        .documents()
        .find_by_natural_key("x", "drive-1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_eligibility_skips() {
    let mut config = MirrorConfig::default();
    config.exclude_extensions = vec![".tmp".to_string()];
    config.max_file_size_bytes = 10;
    let h = harness_with(config).await;

    let mut big = file_item("big", "/big.bin", T1);
    big.size = 11;

    h.feed
        .script(vec![file_item("t", "/scratch.tmp", T1), big], "link-1")
        .await;
    let run = h.orchestrator.run(SyncOptions::default()).await.unwrap();

    assert_eq!(run.files_skipped, 2);
    assert_eq!(run.files_added, 0);
    assert_eq!(h.feed.download_count(), 0);
    assert_eq!(h.documents().count_active().await.unwrap(), 0);
}

#[tokio::test]
async fn test_dry_run_counts_without_writing() {
    let h = harness().await;
    h.feed.set_content("a", b"aaa").await;
    h.feed.script(vec![file_item("a", "/a.txt", T1)], "link-1").await;

    let run = h
        .orchestrator
        .run(SyncOptions {
            dry_run: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(run.status, "completed");
    assert_eq!(run.files_added, 1);

    // No documents, blobs, events, downloads, or cursor
    assert_eq!(h.documents().count_active().await.unwrap(), 0);
    assert_eq!(h.store.count().await.unwrap(), 0);
    assert!(h.events().for_run(run.id).await.unwrap().is_empty());
    assert_eq!(h.feed.download_count(), 0);
    assert!(h.tokens().get("drive-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_run_rejected_and_recovered() {
    let h = harness().await;

    // Simulate another process holding the running slot
    h.runs().begin(false).await.unwrap();

    let err = h.orchestrator.run(SyncOptions::default()).await.unwrap_err();
    assert!(matches!(err, SyncError::RunInProgress));
    assert_eq!(h.runs().recent(10).await.unwrap().len(), 1);

    // Crash recovery releases the slot
    assert_eq!(h.orchestrator.recover_interrupted().await.unwrap(), 1);

    h.feed.set_content("a", b"aaa").await;
    h.feed.script(vec![file_item("a", "/a.txt", T1)], "link-1").await;
    let run = h.orchestrator.run(SyncOptions::default()).await.unwrap();
    assert_eq!(run.files_added, 1);
}

#[tokio::test]
async fn test_full_sync_discards_delta_cursor() {
    let h = harness().await;
    h.feed.set_content("a", b"aaa").await;
    h.seed(vec![file_item("a", "/a.txt", T1)]).await;
    assert!(h.tokens().get("drive-1").await.unwrap().is_some());

    h.feed.script(vec![file_item("a", "/a.txt", T1)], "link-full").await;
    h.orchestrator
        .run(SyncOptions {
            full_sync: true,
            ..Default::default()
        })
        .await
        .unwrap();

    // The second drain started from scratch, not from the stored cursor
    let links = h.feed.seen_links.lock().await.clone();
    assert_eq!(links, vec![None, None]);

    let token = h.tokens().get("drive-1").await.unwrap().unwrap();
    assert_eq!(token.delta_link, "link-full");
}

#[tokio::test]
async fn test_incremental_run_replays_stored_cursor() {
    let h = harness().await;
    h.feed.set_content("a", b"aaa").await;
    h.seed(vec![file_item("a", "/a.txt", T1)]).await;

    h.feed.script(vec![], "link-2").await;
    h.orchestrator.run(SyncOptions::default()).await.unwrap();

    let links = h.feed.seen_links.lock().await.clone();
    assert_eq!(links, vec![None, Some("link-initial".to_string())]);
}

#[tokio::test]
async fn test_unknown_library_fails_without_run_row() {
    let h = harness().await;

    let err = h
        .orchestrator
        .run(SyncOptions {
            library: Some("No Such Library".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::DriveNotFound(_)));
    assert!(h.runs().recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_library_name_is_case_insensitive() {
    let h = harness().await;
    h.feed.set_content("a", b"aaa").await;
    h.feed.script(vec![file_item("a", "/a.txt", T1)], "link-1").await;

    let run = h
        .orchestrator
        .run(SyncOptions {
            library: Some("documents".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(run.files_added, 1);
}

#[tokio::test]
async fn test_per_item_failure_does_not_abort_run() {
    let h = harness().await;
    // Content only provided for "b"; downloading "a" fails
    h.feed.set_content("b", b"bbb").await;
    h.feed
        .script(
            vec![file_item("a", "/a.txt", T1), file_item("b", "/b.txt", T1)],
            "link-1",
        )
        .await;

    let run = h.orchestrator.run(SyncOptions::default()).await.unwrap();

    assert_eq!(run.status, "completed");
    assert_eq!(run.files_added, 1);
    let message = run.error_message.unwrap();
    assert!(message.contains("/a.txt"), "got: {message}");
}

#[tokio::test]
async fn test_feed_failure_fails_run() {
    let h = harness().await;
    // No script entries: list_changes errors

    let err = h.orchestrator.run(SyncOptions::default()).await.unwrap_err();
    assert!(matches!(err, SyncError::Feed(_)));

    let run = h.runs().latest().await.unwrap().unwrap();
    assert_eq!(run.status, "failed");
    assert!(run.error_message.unwrap().contains("script exhausted"));
}

#[tokio::test]
async fn test_reappearing_item_resurrects_row() {
    let h = harness().await;
    h.feed.set_content("a", b"v1").await;
    h.seed(vec![file_item("a", "/a.txt", T1)]).await;

    let original = h
        .documents()
        .find_by_natural_key("a", "drive-1")
        .await
        .unwrap()
        .unwrap();

    h.feed.script(vec![tombstone("a")], "link-2").await;
    h.orchestrator.run(SyncOptions::default()).await.unwrap();

    h.feed.set_content("a", b"v2").await;
    h.feed.script(vec![file_item("a", "/a.txt", T2)], "link-3").await;
    let run = h.orchestrator.run(SyncOptions::default()).await.unwrap();

    assert_eq!(run.files_added, 1);

    let revived = h
        .documents()
        .find_by_natural_key("a", "drive-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(revived.id, original.id, "natural key reuses its row");
    assert!(!revived.is_deleted);
    assert_ne!(revived.file_blob_id, original.file_blob_id);
}

#[tokio::test]
async fn test_metadata_only_mode_stores_no_content() {
    let mut config = MirrorConfig::default();
    config.metadata_only = true;
    let h = harness_with(config).await;

    h.feed.script(vec![file_item("a", "/a.txt", T1)], "link-1").await;
    let run = h.orchestrator.run(SyncOptions::default()).await.unwrap();

    assert_eq!(run.files_added, 1);
    assert_eq!(run.bytes_downloaded, 0);
    assert_eq!(h.feed.download_count(), 0);
    assert_eq!(h.store.count().await.unwrap(), 0);

    let doc = h
        .documents()
        .find_by_natural_key("a", "drive-1")
        .await
        .unwrap()
        .unwrap();
    assert!(doc.file_blob_id.is_none());
    assert_eq!(doc.path, "/a.txt");
}

#[tokio::test]
async fn test_status_reflects_mirror_state() {
    let h = harness().await;
    h.feed.set_content("a", b"aaaa").await;
    h.seed(vec![file_item("a", "/a.txt", T1)]).await;

    let status = h.orchestrator.status().await.unwrap();
    assert!(!status.is_running);
    assert!(status.current_run.is_none());
    assert_eq!(status.last_run.unwrap().status, "completed");
    assert_eq!(status.document_count, 1);
    assert_eq!(status.blob_count, 1);
    assert_eq!(status.total_blob_size, 4);
}

#[tokio::test]
async fn test_clear_delta_tokens() {
    let h = harness().await;
    h.feed.set_content("a", b"aaa").await;
    h.seed(vec![file_item("a", "/a.txt", T1)]).await;

    assert_eq!(h.orchestrator.clear_delta_tokens().await.unwrap(), 1);
    assert!(h.tokens().get("drive-1").await.unwrap().is_none());
}
