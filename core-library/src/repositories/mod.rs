//! Repository traits and SQLite implementations
//!
//! Each repository pairs a trait (the seam the sync core depends on) with
//! a `Sqlite*` implementation over the shared connection pool.

pub mod documents;
pub mod events;
pub mod runs;
pub mod tokens;

pub use documents::{DocumentRepository, SqliteDocumentRepository};
pub use events::{SqliteSyncEventRepository, SyncEventRepository};
pub use runs::{SqliteSyncRunRepository, SyncRunRepository};
pub use tokens::{DeltaTokenRepository, SqliteDeltaTokenRepository};
