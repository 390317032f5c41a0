//! # Core Sync
//!
//! The mirror's sync engine: the orchestrator state machine that turns
//! change-feed entries into ledger and blob mutations, the scope and
//! eligibility filter, and the periodic worker loop.
//!
//! ## Architecture
//!
//! - `orchestrator`: one sync pass — classify every feed entry, apply
//!   the outcome, account for it on the run record
//! - `filter`: include-path and glob-pattern scope, extension/size
//!   eligibility
//! - `worker`: fixed-interval scheduling with crash recovery and
//!   cooperative shutdown
//!
//! Concurrency model: any number of concurrent readers (`status`), at
//! most one sync pass at a time, enforced by the ledger's single-running
//! invariant rather than in-process locking.

pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod worker;

pub use error::{Result, SyncError};
pub use filter::SyncFilter;
pub use orchestrator::{SyncOptions, SyncOrchestrator, SyncStatus};
pub use worker::SyncWorker;
