//! Error types for the sync core

use core_library::LibraryError;
use core_storage::StorageError;
use provider_sharepoint::SharePointError;
use thiserror::Error;

/// Sync orchestration errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// Another run holds the single-running slot
    #[error("A sync run is already in progress")]
    RunInProgress,

    /// The requested document library does not exist on the site
    #[error("Document library not found: {0}")]
    DriveNotFound(String),

    /// Invalid configuration (bad glob pattern, conflicting flags)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Change feed failure; fails the whole run
    #[error("Change feed error: {0}")]
    Feed(#[from] SharePointError),

    /// Blob store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Ledger failure
    #[error("Library error: {0}")]
    Library(LibraryError),
}

impl From<LibraryError> for SyncError {
    fn from(e: LibraryError) -> Self {
        match e {
            LibraryError::RunInProgress => Self::RunInProgress,
            other => Self::Library(other),
        }
    }
}

impl From<core_runtime::Error> for SyncError {
    fn from(e: core_runtime::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
