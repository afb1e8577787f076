//! Sync engine: change tracking, conflict detection and resolution, and the
//! pass that reconciles the local store with the cloud store.

mod detector;
mod orchestrator;
mod registry;
mod resolver;
mod scheduler;
mod tracker;


use crate::error::{Error, Result, TableFailure};

pub use detector::{ConflictDetector, Detection};
pub use orchestrator::SyncOrchestrator;
pub use registry::ConflictRegistry;
pub use resolver::{ConflictResolver, MergeWarning, Reconciled, Side};
pub use scheduler::SyncScheduler;
pub use tracker::ChangeTracker;

/// Counts of what one pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Local changes written to the cloud
    pub pushed: usize,
    /// Cloud changes written locally
    pub pulled: usize,
    /// Local rows removed because the cloud deleted them
    pub removed: usize,
    /// Ids where both sides already agreed
    pub converged: usize,
    /// Conflicts registered or refreshed
    pub conflicts: usize,
    /// Tables that did not complete
    pub failures: Vec<TableFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.conflicts == 0
    }

    /// `Err(PartialSync)` when any table failed.
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::PartialSync(self.failures))
        }
    }
}

/// Result of a sync trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was already running; this trigger did nothing
    Coalesced,
}

impl SyncOutcome {
    pub const fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Coalesced => None,
        }
    }
}
