//! libSQL-backed local store

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{LocalStore, RecordStore, StoredRecord};
use crate::db::{Database, LibSqlSettingsRepository, RecordRepository, SettingsRepository};
use crate::error::{Error, Result};
use crate::models::{RecordId, Settings, Stamp, SyncRecord, SyncStatus, Table};

/// Thread-safe local store over one libSQL connection.
#[derive(Clone)]
pub struct LibSqlStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LibSqlStore {
    /// Open the store at the given filesystem path.
    pub async fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable: {}. Moving it aside and starting fresh.",
                    db_path.display(),
                    error
                );
                quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Load persisted settings.
    pub async fn load_settings(&self) -> Result<Settings> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        repo.load().await
    }

    /// Save settings.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        repo.save(settings).await
    }

    /// Row counts per sync status.
    pub async fn status_counts(&self, user_id: &str) -> Result<Vec<(SyncStatus, i64)>> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        repo.count_by_status(user_id).await
    }
}

fn is_corrupted_db_error(error: &Error) -> bool {
    error
        .to_string()
        .to_ascii_lowercase()
        .contains("file is not a database")
}

/// Rename the database file to `<name>.corrupt-<millis>` and drop its sidecars.
fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
    let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
        return Ok(());
    };

    if db_path.exists() {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));
        std::fs::rename(db_path, &backup_path)?;
        tracing::warn!(
            "Moved corrupted local DB file from {} to {}",
            db_path.display(),
            backup_path.display()
        );
    }

    let Some(parent) = db_path.parent() else {
        return Ok(());
    };
    let sidecar_prefix = format!("{base_name}-");
    for entry in std::fs::read_dir(parent)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with(&sidecar_prefix) {
            let path = entry.path();
            std::fs::remove_file(&path)?;
            tracing::warn!("Removed stale local DB file {}", path.display());
        }
    }

    Ok(())
}

#[async_trait]
impl RecordStore for LibSqlStore {
    async fn list(&self, table: Table, user_id: &str) -> Result<Vec<SyncRecord>> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        Ok(repo
            .list(table, user_id)
            .await?
            .into_iter()
            .map(|stored| stored.record)
            .collect())
    }

    async fn get(
        &self,
        table: Table,
        user_id: &str,
        id: &RecordId,
    ) -> Result<Option<SyncRecord>> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        Ok(repo
            .get(table, id)
            .await?
            .map(|stored| stored.record)
            .filter(|record| record.envelope.user_id == user_id))
    }

    async fn create(&self, record: &SyncRecord) -> Result<SyncRecord> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        repo.insert(record).await?;
        Ok(record.clone())
    }

    async fn update(&self, record: &SyncRecord) -> Result<SyncRecord> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        repo.update(record).await?;
        Ok(record.clone())
    }

    async fn delete(&self, table: Table, _user_id: &str, id: &RecordId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        repo.delete(table, id).await
    }
}

#[async_trait]
impl LocalStore for LibSqlStore {
    async fn list_stored(&self, table: Table, user_id: &str) -> Result<Vec<StoredRecord>> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        repo.list(table, user_id).await
    }

    async fn get_stored(&self, table: Table, id: &RecordId) -> Result<Option<StoredRecord>> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        repo.get(table, id).await
    }

    async fn commit_synced(&self, record: &SyncRecord, expected: Option<Stamp>) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        repo.commit_synced_if(record, expected).await
    }

    async fn rebase(&self, record: &SyncRecord) -> Result<()> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        if !repo.rebase(record).await? {
            tracing::debug!("{}/{} vanished before it could be rebased", record.table(), record.id());
        }
        Ok(())
    }

    async fn delete_if(&self, table: Table, id: &RecordId, expected: Stamp) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        repo.delete_if(table, id, expected).await
    }

    async fn set_status(&self, table: Table, id: &RecordId, status: SyncStatus) -> Result<()> {
        let db = self.db.lock().await;
        let repo = RecordRepository::new(db.connection());
        repo.set_status(table, id, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatabaseMode, Entity, SyncEnvelope, Task};

    fn task_record(user_id: &str) -> SyncRecord {
        SyncRecord {
            envelope: SyncEnvelope {
                table: Table::Task,
                id: RecordId::new(),
                user_id: user_id.to_string(),
                updated_at: Stamp::now(),
                sync_status: SyncStatus::Pending,
                last_synced_at: None,
                deleted: false,
            },
            data: Task::new("Write tests").to_data().unwrap(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_is_scoped_to_user() {
        let store = LibSqlStore::open_in_memory().await.unwrap();
        let record = store.create(&task_record("alice")).await.unwrap();

        assert!(store
            .get(Table::Task, "alice", &record.id())
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get(Table::Task, "bob", &record.id())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_creates_then_updates() {
        let store = LibSqlStore::open_in_memory().await.unwrap();
        let mut record = task_record("alice");
        store.upsert(&record).await.unwrap();

        record.envelope.sync_status = SyncStatus::Synced;
        store.upsert(&record).await.unwrap();

        let listed = store.list(Table::Task, "alice").await.unwrap();
        assert_eq!(listed, vec![record]);
    }

    #[test]
    fn detects_corrupted_db_errors() {
        assert!(is_corrupted_db_error(&Error::Database(
            "SQLite failure: file is not a database".to_string()
        )));
        assert!(!is_corrupted_db_error(&Error::InvalidInput(
            "title cannot be empty".to_string()
        )));
    }

    #[test]
    fn quarantine_moves_db_and_removes_sidecars() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("flowdeck.db");
        let wal_path = tmp.path().join("flowdeck.db-wal");
        std::fs::write(&db_path, b"bad-db").unwrap();
        std::fs::write(&wal_path, b"wal").unwrap();

        quarantine_corrupted_db_files(&db_path).unwrap();

        assert!(!db_path.exists());
        assert!(!wal_path.exists());
        let backups = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("flowdeck.db.corrupt-")
            })
            .count();
        assert_eq!(backups, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn settings_persist_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("flowdeck.db");

        let store = LibSqlStore::open(&path).await.unwrap();
        store
            .save_settings(&Settings {
                mode: Some(DatabaseMode::Cloud),
                user_id: Some("alice".to_string()),
            })
            .await
            .unwrap();
        drop(store);

        let reopened = LibSqlStore::open(&path).await.unwrap();
        assert_eq!(reopened.path(), Some(path.as_path()));
        assert_eq!(
            reopened.load_settings().await.unwrap().mode,
            Some(DatabaseMode::Cloud)
        );
    }
}
