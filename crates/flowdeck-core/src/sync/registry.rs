//! Outstanding conflicts, keyed by record id.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::models::{RecordId, SyncConflict, Table};

struct Entry {
    conflict: SyncConflict,
    /// Set while a resolution for this id is in flight
    resolving: bool,
}

#[derive(Default)]
pub struct ConflictRegistry {
    entries: Mutex<BTreeMap<RecordId, Entry>>,
}

impl ConflictRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<RecordId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time copy of the open conflicts, in id order.
    pub fn snapshot(&self) -> Vec<SyncConflict> {
        self.entries()
            .values()
            .filter(|entry| !entry.resolving)
            .map(|entry| entry.conflict.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn is_resolving(&self, id: &RecordId) -> bool {
        self.entries().get(id).is_some_and(|entry| entry.resolving)
    }

    /// Insert or refresh a conflict; an id being resolved is left alone.
    ///
    /// Refreshing keeps the original detection time.
    pub fn upsert(&self, mut conflict: SyncConflict) {
        let mut entries = self.entries();
        match entries.get_mut(&conflict.id) {
            Some(entry) if entry.resolving => {}
            Some(entry) => {
                conflict.detected_at = entry.conflict.detected_at;
                entry.conflict = conflict;
            }
            None => {
                entries.insert(
                    conflict.id,
                    Entry {
                        conflict,
                        resolving: false,
                    },
                );
            }
        }
    }

    /// Mark a conflict as being resolved and hand out its data.
    pub fn claim(&self, id: &RecordId) -> Result<SyncConflict> {
        let mut entries = self.entries();
        match entries.get_mut(id) {
            Some(entry) if !entry.resolving => {
                entry.resolving = true;
                Ok(entry.conflict.clone())
            }
            Some(_) => Err(Error::UnknownConflict(format!(
                "{id} is already being resolved"
            ))),
            None => Err(Error::UnknownConflict(id.to_string())),
        }
    }

    /// Replace the data of a conflict, even one being resolved, keeping its
    /// detection time.
    pub fn refresh(&self, mut conflict: SyncConflict) {
        if let Some(entry) = self.entries().get_mut(&conflict.id) {
            conflict.detected_at = entry.conflict.detected_at;
            entry.conflict = conflict;
        }
    }

    /// Give a claimed conflict back after a failed resolution.
    pub fn release(&self, id: &RecordId) {
        if let Some(entry) = self.entries().get_mut(id) {
            entry.resolving = false;
        }
    }

    /// Drop a conflict once its resolution has been committed.
    pub fn finish(&self, id: &RecordId) {
        self.entries().remove(id);
    }

    /// Forget conflicts of `table` that a completed pass no longer detected.
    pub fn retain_detected(&self, table: Table, detected: &HashSet<RecordId>) {
        self.entries().retain(|id, entry| {
            entry.resolving || entry.conflict.table != table || detected.contains(id)
        });
    }
}
