//! Record stores: the uniform CRUD surface over a named table.
//!
//! Two instances take part in synchronization: the local libSQL store and a
//! cloud store reached over the network. Stores never reference each other;
//! all cross-store reasoning lives in [`crate::sync`].

mod http;
mod local;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

pub use crate::db::StoredRecord;
use crate::error::Result;
use crate::models::{RecordId, Stamp, SyncRecord, SyncStatus, Table};
pub use http::{HttpConnector, HttpStore};
pub use local::LibSqlStore;
pub use memory::MemoryStore;

/// CRUD over syncable rows, scoped by table and user.
///
/// Listing returns tombstones too; filtering them is the façade's job.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Connectivity probe; stores without a network hop are always reachable
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list(&self, table: Table, user_id: &str) -> Result<Vec<SyncRecord>>;

    async fn get(&self, table: Table, user_id: &str, id: &RecordId)
        -> Result<Option<SyncRecord>>;

    async fn create(&self, record: &SyncRecord) -> Result<SyncRecord>;

    async fn update(&self, record: &SyncRecord) -> Result<SyncRecord>;

    /// Physically remove a row
    async fn delete(&self, table: Table, user_id: &str, id: &RecordId) -> Result<()>;

    /// Update when the row exists, create otherwise
    async fn upsert(&self, record: &SyncRecord) -> Result<SyncRecord> {
        let existing = self
            .get(record.table(), &record.envelope.user_id, &record.id())
            .await?;
        if existing.is_some() {
            self.update(record).await
        } else {
            self.create(record).await
        }
    }
}

/// The offline-first side: keeps the last reconciled body next to each row.
#[async_trait]
pub trait LocalStore: RecordStore {
    async fn list_stored(&self, table: Table, user_id: &str) -> Result<Vec<StoredRecord>>;

    async fn get_stored(&self, table: Table, id: &RecordId) -> Result<Option<StoredRecord>>;

    /// Write a reconciled row and its new base atomically, provided the row
    /// still carries `expected` as its `updated_at` (`None`: no row yet).
    ///
    /// Returns `false` without writing when the row moved since it was read.
    async fn commit_synced(&self, record: &SyncRecord, expected: Option<Stamp>) -> Result<bool>;

    /// Take `record` as the new base of a row that was edited after being read
    async fn rebase(&self, record: &SyncRecord) -> Result<()>;

    /// Remove a row unless it moved past `expected`; returns whether it went
    async fn delete_if(&self, table: Table, id: &RecordId, expected: Stamp) -> Result<bool>;

    async fn set_status(&self, table: Table, id: &RecordId, status: SyncStatus) -> Result<()>;
}

/// Opens a cloud store for a user; one connection per façade.
#[async_trait]
pub trait CloudConnector: Send + Sync {
    async fn connect(&self, user_id: &str) -> Result<Arc<dyn RecordStore>>;
}
