//! # Logging & Tracing Infrastructure
//!
//! Configures the `tracing-subscriber` stack for the mirror: an `EnvFilter`
//! (honoring `RUST_LOG` when set) in front of a pretty, compact, or JSON
//! formatter. Call [`init_logging`] once at process start; later calls fail
//! because the global subscriber is already installed.

use crate::error::{Error, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Compact single-line format
    Compact,
    /// Structured JSON format for machine parsing
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Default directive applied when `RUST_LOG` is unset, e.g. `"info"`
    pub default_directive: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            default_directive: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns `Error::Logging` if a global subscriber is already installed or
/// the filter directive cannot be parsed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_directive))
        .map_err(|e| Error::Logging(e.to_string()))?;

    let builder = fmt().with_env_filter(filter);

    match config.format {
        LogFormat::Pretty => builder
            .pretty()
            .try_init()
            .map_err(|e| Error::Logging(e.to_string()))?,
        LogFormat::Compact => builder
            .compact()
            .try_init()
            .map_err(|e| Error::Logging(e.to_string()))?,
        LogFormat::Json => builder
            .json()
            .try_init()
            .map_err(|e| Error::Logging(e.to_string()))?,
    }

    Ok(())
}
