//! # Change Feed Abstraction
//!
//! The provider-facing seam the sync core depends on: parsed item and
//! drive models plus the [`ChangeFeed`] trait. The production
//! implementation is `SharePointClient`; tests substitute scripted
//! feeds.

use crate::error::Result;
use crate::types::DriveItemResource;
use async_trait::async_trait;
use bytes::Bytes;

/// A document library on the remote site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drive {
    pub id: String,
    pub name: String,
    pub web_url: Option<String>,
}

/// A change-feed entry, parsed from the wire representation.
///
/// Tombstones (`is_deleted`) carry only identity; every other field may
/// be empty for them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    /// Library-relative path, e.g. `/Projects/Active/spec.docx`
    pub path: String,
    pub is_folder: bool,
    pub is_deleted: bool,
    pub size: i64,
    pub mime_type: Option<String>,
    pub web_url: Option<String>,
    pub created_by: Option<String>,
    pub last_modified_by: Option<String>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    /// Remote QuickXorHash (base64), when the service reports one
    pub quickxor_hash: Option<String>,
    /// Pre-authenticated content URL; short-lived
    pub download_url: Option<String>,
}

/// Parse a wire driveItem into the feed model.
///
/// The library-relative path is derived from the parent's canonical path,
/// which has the form `/drives/{id}/root:/Folder/Sub`: everything after
/// the first `:` is the parent folder, and the item's name is appended.
/// Items directly under the root resolve to `/{name}`.
pub fn parse_item(resource: DriveItemResource) -> DriveItem {
    let name = resource.name.clone().unwrap_or_default();

    let parent_path = resource
        .parent_reference
        .as_ref()
        .and_then(|p| p.path.as_deref())
        .and_then(|p| p.split_once(':').map(|(_, rest)| rest.to_string()))
        .unwrap_or_default();

    let path = format!("{parent_path}/{name}");

    let (mime_type, quickxor_hash) = match &resource.file {
        Some(file) => (
            file.mime_type.clone(),
            file.hashes.as_ref().and_then(|h| h.quick_xor_hash.clone()),
        ),
        None => (None, None),
    };

    DriveItem {
        id: resource.id,
        name,
        path,
        is_folder: resource.folder.is_some(),
        is_deleted: resource.deleted.is_some(),
        size: resource.size.unwrap_or(0),
        mime_type,
        web_url: resource.web_url,
        created_by: resource
            .created_by
            .and_then(|i| i.user)
            .and_then(|u| u.display_name),
        last_modified_by: resource
            .last_modified_by
            .and_then(|i| i.user)
            .and_then(|u| u.display_name),
        created_at: resource.created_date_time,
        modified_at: resource.last_modified_date_time,
        quickxor_hash,
        download_url: resource.download_url,
    }
}

/// Remote change source.
///
/// `list_changes` drains the feed completely: it follows pagination
/// internally and returns all entries plus the cursor for the next call.
/// The cursor is opaque and must only be persisted after the entries it
/// covers have been applied.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Enumerate the site's document libraries
    async fn list_drives(&self) -> Result<Vec<Drive>>;

    /// Find a library by display name, case-insensitively
    async fn drive_by_name(&self, name: &str) -> Result<Option<Drive>> {
        let drives = self.list_drives().await?;
        Ok(drives.into_iter().find(|d| d.name.eq_ignore_ascii_case(name)))
    }

    /// Fetch all changes since `delta_link`, or the full current state
    /// when `delta_link` is `None`. Returns the entries and the cursor
    /// for the next incremental call.
    async fn list_changes(
        &self,
        drive_id: &str,
        delta_link: Option<&str>,
    ) -> Result<(Vec<DriveItem>, String)>;

    /// Download an item's content
    async fn download(&self, drive_id: &str, item: &DriveItem) -> Result<Bytes>;

    /// Verify credentials and site reachability
    async fn test_connection(&self) -> Result<()>;
}
