//! Microsoft Graph API response types
//!
//! Data structures for deserializing Graph v1.0 responses. Only the
//! fields the mirror consumes are modeled; unknown fields are ignored.

use serde::Deserialize;

/// OAuth2 token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

/// Graph site resource
///
/// See: https://learn.microsoft.com/graph/api/resources/site
#[derive(Debug, Deserialize)]
pub struct SiteResponse {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Collection wrapper for drive listings
#[derive(Debug, Deserialize)]
pub struct DriveCollection {
    pub value: Vec<DriveResource>,
}

/// Graph drive resource (a document library)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveResource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// One page of a delta query
///
/// `@odata.nextLink` is present while more pages remain;
/// `@odata.deltaLink` appears only on the final page.
#[derive(Debug, Deserialize)]
pub struct DeltaPage {
    pub value: Vec<DriveItemResource>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
    #[serde(rename = "@odata.deltaLink")]
    pub delta_link: Option<String>,
}

/// Graph driveItem resource
///
/// See: https://learn.microsoft.com/graph/api/resources/driveitem
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItemResource {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<String>,
    #[serde(default)]
    pub parent_reference: Option<ParentReference>,
    #[serde(default)]
    pub file: Option<FileFacet>,
    #[serde(default)]
    pub folder: Option<FolderFacet>,
    /// Present (possibly empty) iff the item was deleted
    #[serde(default)]
    pub deleted: Option<DeletedFacet>,
    #[serde(default)]
    pub created_by: Option<IdentitySet>,
    #[serde(default)]
    pub last_modified_by: Option<IdentitySet>,
    /// Pre-authenticated, short-lived content URL
    #[serde(default, rename = "@microsoft.graph.downloadUrl")]
    pub download_url: Option<String>,
}

/// Parent of a driveItem. `path` looks like `/drives/{id}/root:/Folder`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    #[serde(default)]
    pub drive_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// File facet; its presence marks the item as a file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub hashes: Option<HashesFacet>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashesFacet {
    #[serde(default)]
    pub quick_xor_hash: Option<String>,
    #[serde(default)]
    pub sha256_hash: Option<String>,
}

/// Folder facet; its presence marks the item as a folder
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    #[serde(default)]
    pub child_count: Option<i64>,
}

/// Deleted facet, attached to tombstones in delta responses
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedFacet {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySet {
    #[serde(default)]
    pub user: Option<Identity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
