//! Shared database façade used across clients.
//!
//! One instance serves one [`DatabaseConfig`]. It routes reads and writes to
//! the store the mode calls for and, in `sync` mode, owns the sync engine and
//! its periodic scheduler.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::config::CloudConfig;
use crate::error::{Error, Result};
use crate::models::{
    ApiKey, Column, DatabaseConfig, DatabaseMode, Entity, Message, Record, RecordId, Reminder,
    Resolution, SyncConflict, SyncRecord, SyncStatus, Table, Task,
};
use crate::state::SyncPhase;
use crate::store::{CloudConnector, LibSqlStore, RecordStore};
use crate::sync::{ChangeTracker, Reconciled, SyncOrchestrator, SyncOutcome, SyncScheduler};

/// Thread-safe façade over the local and cloud stores for one mode.
pub struct DatabaseService {
    config: DatabaseConfig,
    local: LibSqlStore,
    cloud: Option<Arc<dyn RecordStore>>,
    tracker: Arc<ChangeTracker>,
    orchestrator: Option<Arc<SyncOrchestrator>>,
    scheduler: Mutex<Option<SyncScheduler>>,
    closed: AtomicBool,
}

impl DatabaseService {
    /// Build a façade over an opened local store.
    ///
    /// Cloud-backed modes connect through `connector`; without one they fail
    /// with [`Error::Offline`].
    pub async fn open(
        config: DatabaseConfig,
        local: LibSqlStore,
        connector: Option<Arc<dyn CloudConnector>>,
        cloud_config: &CloudConfig,
    ) -> Result<Self> {
        let mode = config.mode();
        let cloud = if mode.uses_cloud() {
            let connector = connector.ok_or_else(|| {
                Error::Offline(format!("{mode} mode needs a configured cloud store"))
            })?;
            Some(connector.connect(config.user_id()).await?)
        } else {
            None
        };

        let tracker = Arc::new(ChangeTracker::new());
        let orchestrator = match (&cloud, mode) {
            (Some(cloud), DatabaseMode::Sync) => Some(Arc::new(SyncOrchestrator::new(
                Arc::new(local.clone()),
                Arc::clone(cloud),
                Arc::clone(&tracker),
                config.user_id(),
                cloud_config.table_timeout,
            ))),
            _ => None,
        };
        let scheduler = match (&orchestrator, cloud_config.sync_interval) {
            (Some(orchestrator), Some(interval)) => {
                tracing::info!("Automatic sync every {interval:?}");
                Some(SyncScheduler::spawn(Arc::clone(orchestrator), interval))
            }
            _ => None,
        };

        tracing::info!("Database service ready in {mode} mode");
        Ok(Self {
            config,
            local,
            cloud,
            tracker,
            orchestrator,
            scheduler: Mutex::new(scheduler),
            closed: AtomicBool::new(false),
        })
    }

    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub const fn mode(&self) -> DatabaseMode {
        self.config.mode()
    }

    pub(crate) const fn local_store(&self) -> &LibSqlStore {
        &self.local
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop the scheduler, abort any running pass and refuse further calls.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(scheduler) = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            scheduler.stop();
        }
        if let Some(orchestrator) = &self.orchestrator {
            orchestrator.abort();
        }
        tracing::info!("Database service in {} mode closed", self.mode());
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Store that serves reads and writes in the current mode.
    fn store(&self) -> &dyn RecordStore {
        match (&self.cloud, self.mode()) {
            (Some(cloud), DatabaseMode::Cloud) => cloud.as_ref(),
            _ => &self.local,
        }
    }

    fn writes_to_cloud(&self) -> bool {
        self.mode() == DatabaseMode::Cloud
    }

    fn user_id(&self) -> &str {
        self.config.user_id()
    }

    async fn find_live(&self, table: Table, id: &RecordId) -> Result<Option<SyncRecord>> {
        Ok(self
            .store()
            .get(table, self.user_id(), id)
            .await?
            .filter(|record| !record.is_tombstone()))
    }

    /// Persist a new entity and return it with its envelope.
    pub async fn create<T: Entity>(&self, fields: T) -> Result<Record<T>> {
        self.ensure_open()?;
        let mut record = self
            .tracker
            .stamp_create(T::TABLE, self.user_id(), fields.to_data()?);
        if self.writes_to_cloud() {
            record = self.tracker.stamp_cloud_write(record);
        }
        let stored = self.store().create(&record).await?;
        tracing::debug!("Created {}/{}", T::TABLE, stored.id());
        Record::from_sync(stored)
    }

    /// All live entities of a table, ordered by id.
    pub async fn list<T: Entity>(&self) -> Result<Vec<Record<T>>> {
        self.ensure_open()?;
        self.store()
            .list(T::TABLE, self.user_id())
            .await?
            .into_iter()
            .filter(|record| !record.is_tombstone())
            .map(Record::<T>::from_sync)
            .collect()
    }

    pub async fn get<T: Entity>(&self, id: &RecordId) -> Result<Option<Record<T>>> {
        self.ensure_open()?;
        self.find_live(T::TABLE, id)
            .await?
            .map(Record::from_sync)
            .transpose()
    }

    /// Replace an entity's fields.
    pub async fn update<T: Entity>(&self, id: &RecordId, fields: T) -> Result<Record<T>> {
        self.ensure_open()?;
        let existing = self
            .find_live(T::TABLE, id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let mut record = self.tracker.stamp_update(&existing, fields.to_data()?);
        if self.writes_to_cloud() {
            record = self.tracker.stamp_cloud_write(record);
        }
        let stored = self.store().update(&record).await?;
        tracing::debug!("Updated {}/{id}", T::TABLE);
        Record::from_sync(stored)
    }

    /// Delete an entity.
    ///
    /// Rows that were ever reconciled become tombstones so the deletion can
    /// reach the other store; rows that never left this device are removed.
    pub async fn delete<T: Entity>(&self, id: &RecordId) -> Result<()> {
        self.ensure_open()?;
        let existing = self
            .find_live(T::TABLE, id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if self.writes_to_cloud() {
            let mut tombstone = existing;
            tombstone.envelope.deleted = true;
            self.store()
                .update(&self.tracker.stamp_cloud_write(tombstone))
                .await?;
        } else if let Some(tombstone) = self.tracker.stamp_delete(&existing) {
            self.store().update(&tombstone).await?;
        } else {
            self.store().delete(T::TABLE, self.user_id(), id).await?;
        }
        tracing::debug!("Deleted {}/{id}", T::TABLE);
        Ok(())
    }

    /// Run a sync pass now.
    ///
    /// Fails with [`Error::Offline`] outside `sync` mode or when the cloud is
    /// unreachable.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        self.ensure_open()?;
        let orchestrator = self.orchestrator.as_ref().ok_or_else(|| {
            Error::Offline(format!("sync is unavailable in {} mode", self.mode()))
        })?;
        orchestrator.sync().await
    }

    /// Snapshot of the open conflicts.
    pub fn conflicts(&self) -> Vec<SyncConflict> {
        self.orchestrator
            .as_ref()
            .map(|orchestrator| orchestrator.conflicts())
            .unwrap_or_default()
    }

    pub async fn resolve_conflict(
        &self,
        id: &RecordId,
        resolution: Resolution,
    ) -> Result<Reconciled> {
        self.ensure_open()?;
        let orchestrator = self
            .orchestrator
            .as_ref()
            .ok_or_else(|| Error::UnknownConflict(id.to_string()))?;
        orchestrator.resolve_conflict(id, resolution).await
    }

    /// Observe sync phases; `None` outside `sync` mode.
    pub fn subscribe(&self) -> Option<watch::Receiver<SyncPhase>> {
        self.orchestrator
            .as_ref()
            .map(|orchestrator| orchestrator.subscribe())
    }

    pub fn has_scheduler(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(SyncScheduler::is_running)
    }

    /// Local row counts per sync status.
    pub async fn status_counts(&self) -> Result<Vec<(SyncStatus, i64)>> {
        self.ensure_open()?;
        self.local.status_counts(self.user_id()).await
    }

    pub async fn create_task(&self, task: Task) -> Result<Record<Task>> {
        self.create(task).await
    }

    pub async fn get_tasks(&self) -> Result<Vec<Record<Task>>> {
        self.list().await
    }

    pub async fn get_task(&self, id: &RecordId) -> Result<Option<Record<Task>>> {
        self.get(id).await
    }

    pub async fn update_task(&self, id: &RecordId, task: Task) -> Result<Record<Task>> {
        self.update(id, task).await
    }

    pub async fn delete_task(&self, id: &RecordId) -> Result<()> {
        self.delete::<Task>(id).await
    }

    pub async fn create_column(&self, column: Column) -> Result<Record<Column>> {
        self.create(column).await
    }

    pub async fn get_columns(&self) -> Result<Vec<Record<Column>>> {
        self.list().await
    }

    pub async fn get_column(&self, id: &RecordId) -> Result<Option<Record<Column>>> {
        self.get(id).await
    }

    pub async fn update_column(&self, id: &RecordId, column: Column) -> Result<Record<Column>> {
        self.update(id, column).await
    }

    pub async fn delete_column(&self, id: &RecordId) -> Result<()> {
        self.delete::<Column>(id).await
    }

    pub async fn create_reminder(&self, reminder: Reminder) -> Result<Record<Reminder>> {
        self.create(reminder).await
    }

    pub async fn get_reminders(&self) -> Result<Vec<Record<Reminder>>> {
        self.list().await
    }

    pub async fn get_reminder(&self, id: &RecordId) -> Result<Option<Record<Reminder>>> {
        self.get(id).await
    }

    pub async fn update_reminder(
        &self,
        id: &RecordId,
        reminder: Reminder,
    ) -> Result<Record<Reminder>> {
        self.update(id, reminder).await
    }

    pub async fn delete_reminder(&self, id: &RecordId) -> Result<()> {
        self.delete::<Reminder>(id).await
    }

    pub async fn create_message(&self, message: Message) -> Result<Record<Message>> {
        self.create(message).await
    }

    pub async fn get_messages(&self) -> Result<Vec<Record<Message>>> {
        self.list().await
    }

    pub async fn get_message(&self, id: &RecordId) -> Result<Option<Record<Message>>> {
        self.get(id).await
    }

    pub async fn update_message(&self, id: &RecordId, message: Message) -> Result<Record<Message>> {
        self.update(id, message).await
    }

    pub async fn delete_message(&self, id: &RecordId) -> Result<()> {
        self.delete::<Message>(id).await
    }

    pub async fn create_api_key(&self, api_key: ApiKey) -> Result<Record<ApiKey>> {
        self.create(api_key).await
    }

    pub async fn get_api_keys(&self) -> Result<Vec<Record<ApiKey>>> {
        self.list().await
    }

    pub async fn get_api_key(&self, id: &RecordId) -> Result<Option<Record<ApiKey>>> {
        self.get(id).await
    }

    pub async fn update_api_key(&self, id: &RecordId, api_key: ApiKey) -> Result<Record<ApiKey>> {
        self.update(id, api_key).await
    }

    pub async fn delete_api_key(&self, id: &RecordId) -> Result<()> {
        self.delete::<ApiKey>(id).await
    }
}

impl fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseService")
            .field("mode", &self.mode())
            .field("user_id", &self.config.user_id())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for DatabaseService {
    fn drop(&mut self) {
        if let Some(orchestrator) = &self.orchestrator {
            orchestrator.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    async fn service(mode: DatabaseMode, cloud: &MemoryStore) -> DatabaseService {
        let local = LibSqlStore::open_in_memory().await.unwrap();
        DatabaseService::open(
            DatabaseConfig::new(mode, "alice"),
            local,
            Some(Arc::new(cloud.clone())),
            &CloudConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_mode_writes_pending_rows_locally() {
        let cloud = MemoryStore::new();
        let service = service(DatabaseMode::Local, &cloud).await;

        let task = service.create_task(Task::new("Buy milk")).await.unwrap();
        assert_eq!(task.sync_status(), SyncStatus::Pending);
        assert_eq!(task.fields.title, "Buy milk");
        assert!(cloud.is_empty("alice"));

        let listed = service.get_tasks().await.unwrap();
        assert_eq!(listed, vec![task.clone()]);
        assert_eq!(service.get_task(&task.id()).await.unwrap(), Some(task));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_restamps_and_keeps_id() {
        let cloud = MemoryStore::new();
        let service = service(DatabaseMode::Local, &cloud).await;

        let column = service.create_column(Column::new("Todo", 0)).await.unwrap();
        let renamed = service
            .update_column(&column.id(), Column::new("Backlog", 0))
            .await
            .unwrap();
        assert_eq!(renamed.id(), column.id());
        assert!(renamed.envelope.updated_at > column.envelope.updated_at);
        assert_eq!(renamed.fields.title, "Backlog");

        let missing = service
            .update_column(&RecordId::new(), Column::new("x", 1))
            .await
            .unwrap_err();
        assert!(matches!(missing, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_of_unsynced_row_is_physical() {
        let cloud = MemoryStore::new();
        let service = service(DatabaseMode::Local, &cloud).await;

        let message = service
            .create_message(Message::new("conv-1", MessageRole::User, "hi"))
            .await
            .unwrap();
        service.delete_message(&message.id()).await.unwrap();

        assert!(service.get_message(&message.id()).await.unwrap().is_none());
        assert!(service
            .local
            .list(Table::Message, "alice")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cloud_mode_writes_synced_rows_to_the_cloud() {
        let cloud = MemoryStore::new();
        let service = service(DatabaseMode::Cloud, &cloud).await;

        let key = service
            .create_api_key(ApiKey::new("openai", "work", "sk-123"))
            .await
            .unwrap();
        assert_eq!(key.sync_status(), SyncStatus::Synced);
        assert_eq!(cloud.len("alice"), 1);
        assert!(service.local.list(Table::ApiKey, "alice").await.unwrap().is_empty());

        service.delete_api_key(&key.id()).await.unwrap();
        assert!(service.get_api_keys().await.unwrap().is_empty());
        let tombstone = cloud
            .get(Table::ApiKey, "alice", &key.id())
            .await
            .unwrap()
            .unwrap();
        assert!(tombstone.is_tombstone());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_outside_sync_mode_is_offline() {
        let cloud = MemoryStore::new();
        let service = service(DatabaseMode::Local, &cloud).await;
        assert!(matches!(service.sync().await, Err(Error::Offline(_))));
        assert!(service.conflicts().is_empty());
        assert!(service.subscribe().is_none());
        assert!(matches!(
            service.resolve_conflict(&RecordId::new(), Resolution::Local).await,
            Err(Error::UnknownConflict(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cloud_modes_need_a_connector() {
        let local = LibSqlStore::open_in_memory().await.unwrap();
        let result = DatabaseService::open(
            DatabaseConfig::new(DatabaseMode::Sync, "alice"),
            local,
            None,
            &CloudConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::Offline(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closed_service_rejects_calls() {
        let cloud = MemoryStore::new();
        let service = service(DatabaseMode::Sync, &cloud).await;
        service.shutdown();

        assert!(service.is_closed());
        assert_eq!(
            format!("{service:?}"),
            r#"DatabaseService { mode: Sync, user_id: "alice", closed: true, .. }"#
        );
        assert!(matches!(service.get_tasks().await, Err(Error::Closed)));
        assert!(matches!(service.sync().await, Err(Error::Closed)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scheduler_runs_only_with_an_interval() {
        let cloud = MemoryStore::new();
        let without = service(DatabaseMode::Sync, &cloud).await;
        assert!(!without.has_scheduler());

        let local = LibSqlStore::open_in_memory().await.unwrap();
        let with = DatabaseService::open(
            DatabaseConfig::new(DatabaseMode::Sync, "alice"),
            local,
            Some(Arc::new(cloud.clone())),
            &CloudConfig::default().with_sync_interval(std::time::Duration::from_secs(3600)),
        )
        .await
        .unwrap();
        assert!(with.has_scheduler());
        with.shutdown();
        assert!(!with.has_scheduler());
    }
}
