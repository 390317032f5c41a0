//! # Core Runtime
//!
//! Shared runtime infrastructure for the SharePoint mirror:
//! - Configuration (`config`): the explicit, validated settings structure
//!   consumed by every other crate
//! - Logging (`logging`): `tracing`-based structured logging setup
//! - Errors (`error`): runtime-level error type

pub mod config;
pub mod error;
pub mod logging;

pub use config::MirrorConfig;
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LoggingConfig};
