//! Workspace facade crate.
//!
//! Re-exports the individual workspace crates so host applications (a worker
//! process, a CLI, a web dashboard) can depend on `sharepoint-mirror` and wire
//! the mirror together without naming each crate individually.

pub use core_library as library;
pub use core_runtime as runtime;
pub use core_storage as storage;
pub use core_sync as sync;
pub use provider_sharepoint as sharepoint;
