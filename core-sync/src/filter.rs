//! # Scope and Eligibility Filter
//!
//! Two independent gates applied to every feed item:
//!
//! - **Scope** (`in_scope`): is this path part of the mirror at all?
//!   Combines boundary-aware include-path prefixes with an ordered glob
//!   pattern list. An item leaving scope is treated as removed.
//! - **Eligibility** (`is_eligible`): scope-included items can still be
//!   skipped by extension or size without affecting their ledger state.

use crate::error::{Result, SyncError};
use core_runtime::MirrorConfig;
use glob::Pattern;
use tracing::debug;

/// A compiled path pattern; `!`-prefixed source patterns exclude
struct PathRule {
    pattern: Pattern,
    exclude: bool,
}

/// Compiled filter, built once per orchestrator from the configuration
pub struct SyncFilter {
    include_paths: Vec<String>,
    rules: Vec<PathRule>,
    /// True when at least one non-exclusion pattern exists; unmatched
    /// paths then default to excluded
    has_includes: bool,
    include_extensions: Vec<String>,
    exclude_extensions: Vec<String>,
    max_file_size_bytes: u64,
}

impl SyncFilter {
    pub fn new(config: &MirrorConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.path_patterns.len());
        let mut has_includes = false;

        for raw in &config.path_patterns {
            let (source, exclude) = match raw.strip_prefix('!') {
                Some(rest) => (rest, true),
                None => (raw.as_str(), false),
            };
            if !exclude {
                has_includes = true;
            }

            let pattern = Pattern::new(source)
                .map_err(|e| SyncError::Config(format!("invalid path pattern {raw:?}: {e}")))?;
            rules.push(PathRule { pattern, exclude });
        }

        Ok(Self {
            include_paths: config.include_paths.clone(),
            rules,
            has_includes,
            include_extensions: config.include_extensions.clone(),
            exclude_extensions: config.exclude_extensions.clone(),
            max_file_size_bytes: config.max_file_size_bytes,
        })
    }

    /// Whether a path belongs to the mirror.
    ///
    /// Include-path prefixes match only at segment boundaries, so
    /// `/Projects/Active` covers `/Projects/Active/x` but never
    /// `/Projects/ActiveOld/x`. Glob rules are evaluated in order with
    /// first match winning.
    pub fn in_scope(&self, path: &str) -> bool {
        if !self.include_paths.is_empty() {
            let covered = self.include_paths.iter().any(|prefix| {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            });
            if !covered {
                return false;
            }
        }

        for rule in &self.rules {
            if rule.pattern.matches(path) {
                return !rule.exclude;
            }
        }

        !self.has_includes
    }

    /// Whether a scope-included file should actually be mirrored
    pub fn is_eligible(&self, name: &str, size: i64) -> bool {
        if size > 0 && size as u64 > self.max_file_size_bytes {
            debug!(name, size, "Skipping file over size limit");
            return false;
        }

        let lower = name.to_lowercase();

        if self
            .exclude_extensions
            .iter()
            .any(|ext| lower.ends_with(ext.as_str()))
        {
            return false;
        }

        if !self.include_extensions.is_empty()
            && !self
                .include_extensions
                .iter()
                .any(|ext| lower.ends_with(ext.as_str()))
        {
            return false;
        }

        true
    }
}
