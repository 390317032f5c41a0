//! # Core Library
//!
//! The local ledger for the SharePoint mirror: SQLite-backed persistence
//! for documents, content blobs, sync runs, the per-item event trail, and
//! delta cursors.
//!
//! ## Architecture
//!
//! - `db`: connection pool setup (WAL mode, embedded migrations)
//! - `models`: row structs and status enums
//! - `repositories`: trait-based data access with SQLite implementations
//!
//! Blob *bytes* are not stored here. `core-storage` owns the on-disk
//! content-addressed tree and uses the `file_blobs` table in this schema
//! for reference counting.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
