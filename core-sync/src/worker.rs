//! # Periodic Sync Worker
//!
//! Runs sync passes on a fixed interval. On startup, any run left in
//! `running` state by a crashed process is reclassified as failed so the
//! single-running slot is free. Shutdown is cooperative via a
//! `CancellationToken` and only takes effect between runs; an in-flight
//! pass always finishes.

use crate::error::{Result, SyncError};
use crate::orchestrator::{SyncOptions, SyncOrchestrator};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Scheduler driving the orchestrator on a fixed interval
pub struct SyncWorker {
    orchestrator: Arc<SyncOrchestrator>,
    interval: Duration,
    cancel: CancellationToken,
}

impl SyncWorker {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Token for requesting shutdown from another task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled. Each tick attempts one sync pass; a pass
    /// already in progress (e.g. triggered manually) is skipped, and a
    /// failed pass is logged and retried on the next tick.
    pub async fn run(&self) -> Result<()> {
        let repaired = self.orchestrator.recover_interrupted().await?;
        if repaired > 0 {
            info!(repaired, "Reconciled interrupted runs at startup");
        }

        info!(interval_secs = self.interval.as_secs(), "Sync worker started");

        while !self.cancel.is_cancelled() {
            match self.orchestrator.run(SyncOptions::default()).await {
                Ok(run) => {
                    info!(run_id = run.id, "Scheduled sync finished");
                }
                Err(SyncError::RunInProgress) => {
                    info!("Sync already in progress, skipping tick");
                }
                Err(e) => {
                    error!(error = %e, "Scheduled sync failed");
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Sync worker stopped");
        Ok(())
    }
}
