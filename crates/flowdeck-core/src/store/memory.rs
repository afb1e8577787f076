//! In-process record store with injectable faults.
//!
//! Clones share state, so a test can hold one handle while the engine holds
//! another and flip connectivity underneath it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{CloudConnector, RecordStore};
use crate::error::{Error, Result};
use crate::models::{RecordId, SyncRecord, Table};

type Key = (Table, String, RecordId);

#[derive(Default)]
struct State {
    records: BTreeMap<Key, SyncRecord>,
    offline: bool,
    failing: HashSet<Table>,
    delays: HashMap<Table, Duration>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request fail with [`Error::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Make every request against `table` fail with [`Error::Cloud`].
    pub fn fail_table(&self, table: Table) {
        self.state().failing.insert(table);
    }

    pub fn heal_table(&self, table: Table) {
        self.state().failing.remove(&table);
    }

    /// Delay every request against `table`.
    pub fn delay_table(&self, table: Table, delay: Duration) {
        self.state().delays.insert(table, delay);
    }

    /// Number of rows held for a user across all tables, tombstones included
    pub fn len(&self, user_id: &str) -> usize {
        self.state()
            .records
            .keys()
            .filter(|(_, user, _)| user == user_id)
            .count()
    }

    pub fn is_empty(&self, user_id: &str) -> bool {
        self.len(user_id) == 0
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, table: Table) -> Result<()> {
        let delay = self.state().delays.get(&table).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if state.offline {
            return Err(Error::Offline("memory store is offline".to_string()));
        }
        if state.failing.contains(&table) {
            return Err(Error::Cloud(format!("{table} is unavailable")));
        }
        Ok(())
    }
}

fn key(record: &SyncRecord) -> Key {
    (
        record.table(),
        record.envelope.user_id.clone(),
        record.id(),
    )
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        if self.state().offline {
            return Err(Error::Offline("memory store is offline".to_string()));
        }
        Ok(())
    }

    async fn list(&self, table: Table, user_id: &str) -> Result<Vec<SyncRecord>> {
        self.enter(table).await?;
        Ok(self
            .state()
            .records
            .iter()
            .filter(|((t, user, _), _)| *t == table && user == user_id)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn get(
        &self,
        table: Table,
        user_id: &str,
        id: &RecordId,
    ) -> Result<Option<SyncRecord>> {
        self.enter(table).await?;
        Ok(self
            .state()
            .records
            .get(&(table, user_id.to_string(), *id))
            .cloned())
    }

    async fn create(&self, record: &SyncRecord) -> Result<SyncRecord> {
        self.enter(record.table()).await?;
        let mut state = self.state();
        let key = key(record);
        if state.records.contains_key(&key) {
            return Err(Error::Cloud(format!("record {} already exists", record.id())));
        }
        state.records.insert(key, record.clone());
        Ok(record.clone())
    }

    async fn update(&self, record: &SyncRecord) -> Result<SyncRecord> {
        self.enter(record.table()).await?;
        let mut state = self.state();
        let slot = state
            .records
            .get_mut(&key(record))
            .ok_or_else(|| Error::NotFound(record.id().to_string()))?;
        *slot = record.clone();
        Ok(record.clone())
    }

    async fn delete(&self, table: Table, user_id: &str, id: &RecordId) -> Result<()> {
        self.enter(table).await?;
        self.state()
            .records
            .remove(&(table, user_id.to_string(), *id))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

#[async_trait]
impl CloudConnector for MemoryStore {
    async fn connect(&self, _user_id: &str) -> Result<Arc<dyn RecordStore>> {
        Ok(Arc::new(self.clone()))
    }
}
