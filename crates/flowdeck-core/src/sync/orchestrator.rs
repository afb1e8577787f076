//! Runs sync passes and conflict resolutions against one local/cloud pair.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::AbortHandle;

use super::detector::{ConflictDetector, Detection};
use super::registry::ConflictRegistry;
use super::resolver::{ConflictResolver, Reconciled};
use super::tracker::ChangeTracker;
use super::{SyncOutcome, SyncReport};
use crate::error::{Error, Result, TableFailure};
use crate::models::{
    RecordId, Resolution, Stamp, SyncConflict, SyncRecord, SyncStatus, Table,
};
use crate::state::SyncPhase;
use crate::store::{LocalStore, RecordStore, StoredRecord};

/// Where a table-level failure came from
enum Fault {
    /// Cloud request failed; isolated to the table
    Cloud(Error),
    /// Local store failed; aborts the pass
    Local(Error),
}

type FaultResult<T> = std::result::Result<T, Fault>;

/// Effect of bringing one cloud row into the local store
enum Pulled {
    Written,
    Removed,
    Nothing,
}

/// Clears the in-flight flag and any active phase when a pass ends, including
/// when its task is aborted.
struct PassGuard<'a> {
    in_flight: &'a AtomicBool,
    phase: &'a watch::Sender<SyncPhase>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.phase.send_if_modified(|phase| {
            if phase.is_active() {
                *phase = SyncPhase::Idle;
                true
            } else {
                false
            }
        });
        self.in_flight.store(false, Ordering::Release);
    }
}

pub struct SyncOrchestrator {
    local: Arc<dyn LocalStore>,
    cloud: Arc<dyn RecordStore>,
    tracker: Arc<ChangeTracker>,
    registry: ConflictRegistry,
    user_id: String,
    table_timeout: Duration,
    in_flight: AtomicBool,
    passes: Mutex<Vec<AbortHandle>>,
    phase: watch::Sender<SyncPhase>,
}

impl SyncOrchestrator {
    pub fn new(
        local: Arc<dyn LocalStore>,
        cloud: Arc<dyn RecordStore>,
        tracker: Arc<ChangeTracker>,
        user_id: impl Into<String>,
        table_timeout: Duration,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            local,
            cloud,
            tracker,
            registry: ConflictRegistry::new(),
            user_id: user_id.into(),
            table_timeout,
            in_flight: AtomicBool::new(false),
            passes: Mutex::new(Vec::new()),
            phase,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn conflicts(&self) -> Vec<SyncConflict> {
        self.registry.snapshot()
    }

    /// Run a pass on its own task so a mode switch can cancel it.
    ///
    /// Returns [`SyncOutcome::Coalesced`] when a pass is already running and
    /// [`Error::Cancelled`] when the pass was aborted.
    pub async fn sync(self: &Arc<Self>) -> Result<SyncOutcome> {
        if self.is_syncing() {
            return Ok(SyncOutcome::Coalesced);
        }

        let orchestrator = Arc::clone(self);
        let task = tokio::spawn(async move { orchestrator.run_pass().await });
        {
            let mut passes = self.passes.lock().unwrap_or_else(PoisonError::into_inner);
            passes.retain(|handle| !handle.is_finished());
            passes.push(task.abort_handle());
        }

        match task.await {
            Ok(outcome) => outcome,
            Err(error) if error.is_cancelled() => Err(Error::Cancelled),
            Err(error) => Err(Error::Database(format!("sync task failed: {error}"))),
        }
    }

    /// Abort every pass started through [`Self::sync`].
    pub fn abort(&self) {
        let passes =
            std::mem::take(&mut *self.passes.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in passes {
            handle.abort();
        }
    }

    /// One full pass over every table, on the caller's task.
    pub async fn run_pass(&self) -> Result<SyncOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Sync pass already running; trigger coalesced");
            return Ok(SyncOutcome::Coalesced);
        }
        let _guard = PassGuard {
            in_flight: &self.in_flight,
            phase: &self.phase,
        };

        self.cloud.ping().await.map_err(|error| match error {
            Error::Offline(message) => Error::Offline(message),
            other => Error::Offline(other.to_string()),
        })?;

        let mut report = SyncReport::default();
        for table in Table::SYNC_ORDER {
            let outcome =
                tokio::time::timeout(self.table_timeout, self.sync_table(table, &mut report))
                    .await;
            let reason = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(Fault::Local(error))) => return Err(error),
                Ok(Err(Fault::Cloud(error))) => error.to_string(),
                Err(_) => format!("timed out after {:?}", self.table_timeout),
            };
            tracing::warn!("Sync of {table} failed: {reason}");
            report.failures.push(TableFailure { table, reason });
        }

        let next = if self.registry.is_empty() {
            SyncPhase::Idle
        } else {
            SyncPhase::AwaitingResolution
        };
        self.phase.send_replace(next);

        tracing::info!(
            pushed = report.pushed,
            pulled = report.pulled,
            removed = report.removed,
            converged = report.converged,
            conflicts = report.conflicts,
            failed_tables = report.failures.len(),
            "Sync pass finished"
        );
        Ok(SyncOutcome::Completed(report))
    }

    async fn sync_table(&self, table: Table, report: &mut SyncReport) -> FaultResult<()> {
        self.phase.send_replace(SyncPhase::Pulling(table));
        let cloud_rows = self
            .cloud
            .list(table, &self.user_id)
            .await
            .map_err(Fault::Cloud)?;
        for row in &cloud_rows {
            self.tracker.observe(row.envelope.updated_at);
        }
        let local_rows = self
            .local
            .list_stored(table, &self.user_id)
            .await
            .map_err(Fault::Local)?;

        self.phase.send_replace(SyncPhase::Detecting(table));
        let mut pairs: BTreeMap<RecordId, (Option<StoredRecord>, Option<SyncRecord>)> =
            BTreeMap::new();
        for stored in local_rows {
            let id = stored.record.id();
            pairs.entry(id).or_default().0 = Some(stored);
        }
        for cloud in cloud_rows {
            let id = cloud.id();
            pairs.entry(id).or_default().1 = Some(cloud);
        }
        let decisions: Vec<_> = pairs
            .into_iter()
            .map(|(id, (local, cloud))| {
                let detection = ConflictDetector::detect(local.as_ref(), cloud.as_ref());
                (id, detection, local, cloud)
            })
            .collect();

        self.phase.send_replace(SyncPhase::Applying(table));
        let mut detected = HashSet::new();
        for (id, detection, local, cloud) in decisions {
            if self.registry.is_resolving(&id) {
                detected.insert(id);
                continue;
            }
            if detection != Detection::Unchanged {
                tracing::debug!("{table}/{id}: {detection:?}");
            }
            match (detection, local, cloud) {
                (Detection::Unchanged, _, _) => {}
                (Detection::LocalOnly | Detection::LocalOnlyChange, Some(local), cloud) => {
                    self.push(local.record, cloud.is_some()).await?;
                    report.pushed += 1;
                }
                (Detection::CloudOnly | Detection::CloudOnlyChange, local, cloud) => {
                    match self.pull(table, &id, read_at(local.as_ref()), cloud).await? {
                        Pulled::Written => report.pulled += 1,
                        Pulled::Removed => report.removed += 1,
                        Pulled::Nothing => {}
                    }
                }
                (Detection::Converged, local, cloud) => {
                    self.pull(table, &id, read_at(local.as_ref()), cloud).await?;
                    report.converged += 1;
                }
                (Detection::Conflicting(kind), Some(local), cloud) => {
                    let conflict = ConflictDetector::conflict(
                        &local,
                        cloud.as_ref(),
                        kind,
                        self.tracker.next(),
                    );
                    if local.record.envelope.sync_status != SyncStatus::Conflict {
                        self.local
                            .set_status(table, &id, SyncStatus::Conflict)
                            .await
                            .map_err(Fault::Local)?;
                    }
                    tracing::debug!("{table}/{id}: registered {kind} conflict");
                    self.registry.upsert(conflict);
                    detected.insert(id);
                    report.conflicts += 1;
                }
                (detection, None, _) => {
                    tracing::warn!("{table}/{id}: {detection:?} without a local row; skipped");
                }
            }
        }
        self.registry.retain_detected(table, &detected);
        Ok(())
    }

    /// Send a local row to the cloud, then record it as reconciled.
    ///
    /// A row edited while the cloud call was in flight stays pending; only
    /// its base moves to what the cloud now holds.
    async fn push(&self, record: SyncRecord, exists_in_cloud: bool) -> FaultResult<()> {
        let read_at = record.envelope.updated_at;
        let synced = self.tracker.mark_synced(record);
        if exists_in_cloud {
            self.cloud.update(&synced).await.map_err(Fault::Cloud)?;
        } else {
            self.cloud.create(&synced).await.map_err(Fault::Cloud)?;
        }

        let committed = if synced.is_tombstone() {
            self.local
                .delete_if(synced.table(), &synced.id(), read_at)
                .await
        } else {
            self.local.commit_synced(&synced, Some(read_at)).await
        }
        .map_err(Fault::Local)?;
        if !committed {
            tracing::debug!(
                "{}/{}: edited during push; kept pending",
                synced.table(),
                synced.id()
            );
            self.local.rebase(&synced).await.map_err(Fault::Local)?;
        }
        Ok(())
    }

    /// Bring the cloud's version of an id into the local store.
    ///
    /// `read_at` is the local row's `updated_at` when the pass read it. A row
    /// that moved since is left alone for the next pass to classify.
    async fn pull(
        &self,
        table: Table,
        id: &RecordId,
        read_at: Option<Stamp>,
        cloud: Option<SyncRecord>,
    ) -> FaultResult<Pulled> {
        match (cloud, read_at) {
            (Some(cloud), read_at) if !cloud.is_tombstone() => {
                let synced = self.tracker.mark_synced(cloud);
                let written = self
                    .local
                    .commit_synced(&synced, read_at)
                    .await
                    .map_err(Fault::Local)?;
                if written {
                    return Ok(Pulled::Written);
                }
            }
            (_, Some(read_at)) => {
                let removed = self
                    .local
                    .delete_if(table, id, read_at)
                    .await
                    .map_err(Fault::Local)?;
                if removed {
                    return Ok(Pulled::Removed);
                }
            }
            (_, None) => return Ok(Pulled::Nothing),
        }
        tracing::debug!("{table}/{id}: edited during pull; left for the next pass");
        Ok(Pulled::Nothing)
    }

    /// Apply the caller's choice for one open conflict.
    ///
    /// The conflict is claimed for the duration, so concurrent calls with the
    /// same id fail with [`Error::UnknownConflict`]. A failed write releases
    /// the claim and leaves the conflict open. When either side changed since
    /// detection nothing is written: the conflict is refreshed from current
    /// data and [`Error::StaleConflict`] returned.
    pub async fn resolve_conflict(
        &self,
        id: &RecordId,
        resolution: Resolution,
    ) -> Result<Reconciled> {
        let conflict = self.registry.claim(id)?;
        let result = self.commit_resolution(&conflict, resolution).await;
        match &result {
            Ok(_) => {
                self.registry.finish(id);
                tracing::info!("Resolved {}/{id} with {resolution}", conflict.table);
            }
            Err(_) => self.registry.release(id),
        }
        if self.registry.is_empty() && !self.is_syncing() {
            self.phase.send_replace(SyncPhase::Idle);
        }
        result
    }

    async fn commit_resolution(
        &self,
        conflict: &SyncConflict,
        resolution: Resolution,
    ) -> Result<Reconciled> {
        self.ensure_current(conflict).await?;

        let Reconciled { record, warnings } = ConflictResolver::reconcile(conflict, resolution);
        for warning in &warnings {
            tracing::warn!("Merge ambiguity: {warning}");
        }

        let record = self.tracker.mark_synced(record);
        self.cloud.upsert(&record).await?;
        let read_at = conflict.local_data.envelope.updated_at;
        let committed = if record.is_tombstone() {
            self.local
                .delete_if(record.table(), &record.id(), read_at)
                .await?
        } else {
            self.local.commit_synced(&record, Some(read_at)).await?
        };
        if !committed {
            tracing::warn!(
                "{}/{} was edited while resolving; the edit stays pending",
                record.table(),
                record.id()
            );
        }

        Ok(Reconciled { record, warnings })
    }

    /// Re-read both sides of a claimed conflict.
    ///
    /// A side that moved since detection makes the conflict stale: the entry
    /// is rebuilt from what the stores hold now, or dropped when the rows no
    /// longer disagree.
    async fn ensure_current(&self, conflict: &SyncConflict) -> Result<()> {
        let (table, id) = (conflict.table, conflict.id);
        let local = self.local.get_stored(table, &id).await?;
        let cloud = self.cloud.get(table, &self.user_id, &id).await?;

        let local_current = local
            .as_ref()
            .is_some_and(|stored| same_revision(&stored.record, &conflict.local_data));
        let cloud_current = cloud.as_ref().map_or_else(
            || conflict.cloud_data.is_tombstone(),
            |cloud| same_revision(cloud, &conflict.cloud_data),
        );
        if local_current && cloud_current {
            return Ok(());
        }

        if let Some(cloud) = &cloud {
            self.tracker.observe(cloud.envelope.updated_at);
        }
        match (ConflictDetector::detect(local.as_ref(), cloud.as_ref()), &local) {
            (Detection::Conflicting(kind), Some(stored)) => {
                let refreshed =
                    ConflictDetector::conflict(stored, cloud.as_ref(), kind, self.tracker.next());
                self.registry.refresh(refreshed);
            }
            (detection, _) => {
                tracing::debug!("{table}/{id}: no longer conflicting ({detection:?})");
                self.registry.finish(&id);
            }
        }
        tracing::info!("{table}/{id}: conflict changed since detection; not resolved");
        Err(Error::StaleConflict(format!("{table}/{id}")))
    }
}

/// `updated_at` of the local row as the pass read it
fn read_at(local: Option<&StoredRecord>) -> Option<Stamp> {
    local.map(|stored| stored.record.envelope.updated_at)
}

/// Same write of the same row: equal stamps and equal content
fn same_revision(current: &SyncRecord, seen: &SyncRecord) -> bool {
    current.envelope.updated_at == seen.envelope.updated_at && current.same_content(seen)
}
