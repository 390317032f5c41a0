//! # Core Storage
//!
//! Content-addressed blob storage for the mirror. Bytes are stored once
//! per distinct SHA-256 hash under a two-level fan-out directory tree;
//! reference counts in the `file_blobs` table track how many documents
//! point at each blob.

pub mod error;
pub mod store;

pub use error::{Result, StorageError};
pub use store::{BlobStore, IntegrityIssue};
