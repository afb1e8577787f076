//! Stamps every mutation with a hybrid logical clock.

use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::models::{RecordId, Stamp, SyncEnvelope, SyncRecord, SyncStatus, Table};

/// Issues strictly increasing stamps and rewrites envelopes for local edits.
///
/// A stamp is never issued at or below any stamp this tracker issued or
/// observed, so a skewed remote clock cannot make a later local edit look
/// older than what it replaces.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    last: Mutex<Option<Stamp>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next stamp: wall clock, or one logical tick past the last known stamp.
    pub fn next(&self) -> Stamp {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Stamp::now();
        let stamp = match *last {
            Some(previous) if previous >= now => previous.successor(),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }

    /// Fold a stamp produced elsewhere into the clock.
    pub fn observe(&self, stamp: Stamp) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.is_none_or(|previous| previous < stamp) {
            *last = Some(stamp);
        }
    }

    /// New record awaiting its first push.
    pub fn stamp_create(&self, table: Table, user_id: &str, data: Map<String, Value>) -> SyncRecord {
        SyncRecord {
            envelope: SyncEnvelope {
                table,
                id: RecordId::new(),
                user_id: user_id.to_string(),
                updated_at: self.next(),
                sync_status: SyncStatus::Pending,
                last_synced_at: None,
                deleted: false,
            },
            data,
        }
    }

    /// Edited copy of `existing` carrying `data`.
    pub fn stamp_update(&self, existing: &SyncRecord, data: Map<String, Value>) -> SyncRecord {
        self.observe(existing.envelope.updated_at);
        let mut record = existing.clone();
        record.data = data;
        record.envelope.updated_at = self.next();
        if record.envelope.sync_status != SyncStatus::Conflict {
            record.envelope.sync_status = SyncStatus::Pending;
        }
        record
    }

    /// Tombstone for `existing`, or `None` when it never reached the cloud
    /// and can be removed outright.
    pub fn stamp_delete(&self, existing: &SyncRecord) -> Option<SyncRecord> {
        existing.envelope.last_synced_at?;
        self.observe(existing.envelope.updated_at);
        let mut record = existing.clone();
        record.envelope.deleted = true;
        record.envelope.updated_at = self.next();
        if record.envelope.sync_status != SyncStatus::Conflict {
            record.envelope.sync_status = SyncStatus::DeletedPending;
        }
        Some(record)
    }

    /// Reconciled copy: `synced`, with `last_synced_at` past `updated_at`.
    pub fn mark_synced(&self, mut record: SyncRecord) -> SyncRecord {
        self.observe(record.envelope.updated_at);
        record.envelope.sync_status = SyncStatus::Synced;
        record.envelope.last_synced_at = Some(self.next());
        record
    }

    /// Record written straight to the cloud, already reconciled.
    pub fn stamp_cloud_write(&self, mut record: SyncRecord) -> SyncRecord {
        let stamp = self.next();
        record.envelope.updated_at = stamp;
        record.envelope.sync_status = SyncStatus::Synced;
        record.envelope.last_synced_at = Some(stamp);
        record
    }
}
