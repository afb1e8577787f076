//! Periodic sync trigger for the `sync` mode.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{SyncOrchestrator, SyncOutcome};

/// Background task that starts a pass every `interval`.
///
/// Dropping the scheduler stops it.
pub struct SyncScheduler {
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    pub fn spawn(orchestrator: Arc<SyncOrchestrator>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; the mode switch already synced.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match orchestrator.sync().await {
                    Ok(SyncOutcome::Completed(report)) if !report.failures.is_empty() => {
                        tracing::warn!(
                            "Scheduled sync left {} table(s) unsynced",
                            report.failures.len()
                        );
                    }
                    Ok(_) => {}
                    Err(error) => tracing::warn!("Scheduled sync failed: {error}"),
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
