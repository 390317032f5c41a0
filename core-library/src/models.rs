//! Domain models for the mirror ledger
//!
//! Row structs map 1:1 onto the SQLite schema. Timestamps are stored as
//! RFC 3339 TEXT so rows stay readable with plain `sqlite3`.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Current UTC time as an RFC 3339 string, the canonical timestamp format
/// for every table in the schema.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

// =============================================================================
// Status Enums
// =============================================================================

/// Lifecycle state of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// Kind of change recorded in the per-item event trail.
///
/// A content modification is recorded as a `ModifyRemove`/`ModifyAdd` pair
/// so the trail shows both the blob that was superseded and the one that
/// replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Add,
    Remove,
    ModifyRemove,
    ModifyAdd,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::ModifyRemove => "modify_remove",
            Self::ModifyAdd => "modify_add",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            "modify_remove" => Ok(Self::ModifyRemove),
            "modify_add" => Ok(Self::ModifyAdd),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

// =============================================================================
// Row Models
// =============================================================================

/// A mirrored document. One row per remote item ever observed; deletions
/// flip `is_deleted` instead of removing the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    /// Item id from the remote drive; unique only within a drive
    pub sharepoint_item_id: String,
    pub sharepoint_drive_id: String,
    pub name: String,
    /// Library-relative path, e.g. `/Projects/Active/spec.docx`
    pub path: String,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub web_url: Option<String>,
    pub created_by: Option<String>,
    pub last_modified_by: Option<String>,
    pub sharepoint_created_at: Option<String>,
    pub sharepoint_modified_at: Option<String>,
    /// Remote QuickXorHash as reported by the feed (base64)
    pub quickxor_hash: Option<String>,
    /// Reference into `file_blobs`; None in metadata-only mode
    pub file_blob_id: Option<i64>,
    pub is_deleted: bool,
    pub synced_at: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for inserting a document; the database assigns `id`,
/// `created_at`, and `updated_at`.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub sharepoint_item_id: String,
    pub sharepoint_drive_id: String,
    pub name: String,
    pub path: String,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub web_url: Option<String>,
    pub created_by: Option<String>,
    pub last_modified_by: Option<String>,
    pub sharepoint_created_at: Option<String>,
    pub sharepoint_modified_at: Option<String>,
    pub quickxor_hash: Option<String>,
    pub file_blob_id: Option<i64>,
}

/// A content-addressed blob record. The bytes themselves live on disk
/// under the two-level fan-out keyed by `sha256_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FileBlob {
    pub id: i64,
    pub sha256_hash: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub reference_count: i64,
    pub created_at: String,
}

/// A sync run with its outcome counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SyncRun {
    pub id: i64,
    pub status: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub is_full_sync: bool,
    pub files_added: i64,
    pub files_modified: i64,
    pub files_removed: i64,
    pub files_unchanged: i64,
    pub files_skipped: i64,
    pub bytes_downloaded: i64,
    pub error_message: Option<String>,
}

impl SyncRun {
    pub fn status(&self) -> Option<RunStatus> {
        RunStatus::from_str(&self.status).ok()
    }
}

/// Mutable counters accumulated over a run and written back on completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub files_added: i64,
    pub files_modified: i64,
    pub files_removed: i64,
    pub files_unchanged: i64,
    pub files_skipped: i64,
    pub bytes_downloaded: i64,
    /// Per-item failures collected during the run; joined into the run's
    /// `error_message` on completion
    pub errors: Vec<String>,
}

impl RunCounters {
    pub fn total_processed(&self) -> i64 {
        self.files_added
            + self.files_modified
            + self.files_removed
            + self.files_unchanged
            + self.files_skipped
    }

    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("; "))
        }
    }
}

/// One entry in the per-item audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SyncEvent {
    pub id: i64,
    pub sync_run_id: i64,
    pub event_type: String,
    pub sharepoint_item_id: String,
    pub name: String,
    pub path: String,
    pub document_id: Option<i64>,
    pub file_size: Option<i64>,
    /// Plain value, not a foreign key: the blob row may be released later
    pub file_blob_id: Option<i64>,
    pub created_at: String,
}

impl SyncEvent {
    pub fn event_type(&self) -> Option<EventType> {
        EventType::from_str(&self.event_type).ok()
    }
}

/// Fields for appending a sync event
#[derive(Debug, Clone)]
pub struct NewSyncEvent {
    pub sync_run_id: i64,
    pub event_type: EventType,
    pub sharepoint_item_id: String,
    pub name: String,
    pub path: String,
    pub document_id: Option<i64>,
    pub file_size: Option<i64>,
    pub file_blob_id: Option<i64>,
}

/// Opaque delta cursor for one drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DeltaToken {
    pub id: i64,
    pub drive_id: String,
    pub delta_link: String,
    pub updated_at: String,
}
