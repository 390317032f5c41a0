//! # Mirror Configuration
//!
//! The explicit, fully enumerated configuration structure consumed by the
//! sync core. An external loader (ini file, environment, test harness) is
//! responsible for populating it; the core only sees this struct.
//!
//! Validation is fail-fast: `validate()` is called once at construction of
//! the orchestrator, and rejects contradictory settings immediately instead
//! of surfacing them mid-run.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the SharePoint mirror core.
///
/// Field defaults match the original deployment defaults: a five minute sync
/// interval, a five minute download timeout, and a 100 MiB size cap.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Azure AD tenant id for the client-credentials flow
    pub tenant_id: String,

    /// Application (client) id
    pub client_id: String,

    /// Application client secret
    pub client_secret: String,

    /// SharePoint site hostname, e.g. `contoso.sharepoint.com`
    pub site_hostname: String,

    /// Server-relative site path, e.g. `/sites/engineering`
    pub site_path: String,

    /// Document library to mirror; `None` mirrors every library on the site
    pub library_name: Option<String>,

    /// Interval between scheduled sync runs
    pub sync_interval: Duration,

    /// Timeout for feed requests and content downloads
    pub download_timeout: Duration,

    /// Files larger than this are skipped (counted, not an error)
    pub max_file_size_bytes: u64,

    /// Filename suffixes to include (empty = include all). Entries are
    /// matched case-insensitively against the end of the filename.
    pub include_extensions: Vec<String>,

    /// Filename suffixes to exclude
    pub exclude_extensions: Vec<String>,

    /// Path prefixes to mirror (empty = whole library). Prefixes match only
    /// at path-segment boundaries: `/Projects/Active` covers
    /// `/Projects/Active/x` but not `/Projects/ActiveOld/x`.
    pub include_paths: Vec<String>,

    /// Ordered glob patterns over item paths; first match wins. A leading
    /// `!` marks an exclusion. If any non-exclusion pattern is present,
    /// unmatched paths default to excluded.
    pub path_patterns: Vec<String>,

    /// Record remote metadata only; never download or store content
    pub metadata_only: bool,

    /// Cross-check downloaded content against the remote QuickXorHash.
    /// Mutually exclusive with `metadata_only`.
    pub verify_quickxor_hash: bool,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Root of the content-addressed blob directory tree
    pub blobs_directory: PathBuf,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            site_hostname: String::new(),
            site_path: String::new(),
            library_name: None,
            sync_interval: Duration::from_secs(300),
            download_timeout: Duration::from_secs(300),
            max_file_size_bytes: 100 * 1024 * 1024,
            include_extensions: Vec::new(),
            exclude_extensions: Vec::new(),
            include_paths: Vec::new(),
            path_patterns: Vec::new(),
            metadata_only: false,
            verify_quickxor_hash: false,
            database_path: PathBuf::from("sharepoint_mirror.sqlite3"),
            blobs_directory: PathBuf::from("blobs"),
        }
    }
}

impl MirrorConfig {
    /// Validate the configuration, rejecting contradictory settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `metadata_only` and `verify_quickxor_hash`
    /// are both enabled: hash verification requires downloading content,
    /// which metadata-only mode forbids.
    pub fn validate(&self) -> Result<()> {
        if self.metadata_only && self.verify_quickxor_hash {
            return Err(Error::Config(
                "metadata_only and verify_quickxor_hash cannot both be enabled".to_string(),
            ));
        }

        if self.sync_interval.is_zero() {
            return Err(Error::Config("sync_interval must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Parse a comma-separated extension list into normalized entries
    /// (lower-cased, leading dot ensured). Empty segments are dropped.
    pub fn parse_extensions(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                let s = s.to_lowercase();
                if s.starts_with('.') {
                    s
                } else {
                    format!(".{s}")
                }
            })
            .collect()
    }

    /// Parse a multi-line list (include paths, glob patterns) into
    /// non-empty trimmed entries, preserving order.
    pub fn parse_lines(raw: &str) -> Vec<String> {
        raw.lines()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
