//! Classifies one record id against both stores.

use crate::models::{ConflictType, Stamp, SyncConflict, SyncRecord, SyncStatus};
use crate::store::StoredRecord;

/// What a pass should do with one record id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Both sides match what was last reconciled
    Unchanged,
    /// Exists only locally and never reached the cloud
    LocalOnly,
    /// Exists only in the cloud
    CloudOnly,
    /// Only the local side moved since the last reconciliation
    LocalOnlyChange,
    /// Only the cloud side moved, including a cloud deletion
    CloudOnlyChange,
    /// Both moved to the same content
    Converged,
    Conflicting(ConflictType),
}

pub struct ConflictDetector;

impl ConflictDetector {
    pub fn detect(local: Option<&StoredRecord>, cloud: Option<&SyncRecord>) -> Detection {
        match (local, cloud) {
            (None, None) => Detection::Unchanged,
            (None, Some(cloud)) if cloud.is_tombstone() => Detection::Unchanged,
            (None, Some(_)) => Detection::CloudOnly,
            (Some(local), None) => Self::detect_cloud_missing(local),
            (Some(local), Some(cloud)) => Self::detect_both(local, cloud),
        }
    }

    fn detect_cloud_missing(stored: &StoredRecord) -> Detection {
        let local = &stored.record;
        if local.is_tombstone() {
            return Detection::Converged;
        }
        if local.envelope.last_synced_at.is_none() {
            return Detection::LocalOnly;
        }
        if local_changed(stored) {
            Detection::Conflicting(ConflictType::CloudDeletedLocalUpdated)
        } else {
            Detection::CloudOnlyChange
        }
    }

    fn detect_both(stored: &StoredRecord, cloud: &SyncRecord) -> Detection {
        let local = &stored.record;
        let local_changed = local_changed(stored);
        let cloud_changed = match &stored.base {
            Some(base) => !cloud.matches_body(base),
            None => newer_than_sync(cloud.envelope.updated_at, local.envelope.last_synced_at),
        };

        match (local_changed, cloud_changed) {
            (false, false) if local.same_content(cloud) => Detection::Unchanged,
            (false, _) => Detection::CloudOnlyChange,
            (true, false) => Detection::LocalOnlyChange,
            (true, true) if local.same_content(cloud) => Detection::Converged,
            (true, true) => Detection::Conflicting(conflict_type(local, cloud)),
        }
    }

    /// Build the registry entry for a conflicting id.
    ///
    /// A cloud deletion that left no row behind is represented by a tombstone
    /// copy of the local record.
    pub fn conflict(
        stored: &StoredRecord,
        cloud: Option<&SyncRecord>,
        conflict_type: ConflictType,
        detected_at: Stamp,
    ) -> SyncConflict {
        let local = &stored.record;
        let cloud_data = cloud.cloned().unwrap_or_else(|| {
            let mut tombstone = local.clone();
            tombstone.envelope.deleted = true;
            tombstone.envelope.sync_status = SyncStatus::Synced;
            if let Some(synced_at) = local.envelope.last_synced_at {
                tombstone.envelope.updated_at = synced_at;
            }
            tombstone
        });

        SyncConflict {
            id: local.id(),
            table: local.table(),
            conflict_type,
            local_data: local.clone(),
            cloud_data,
            base: stored.base.clone(),
            detected_at,
        }
    }
}

fn local_changed(stored: &StoredRecord) -> bool {
    let local = &stored.record;
    if local.envelope.sync_status != SyncStatus::Synced {
        return true;
    }
    match &stored.base {
        Some(base) => !local.matches_body(base),
        None => newer_than_sync(local.envelope.updated_at, local.envelope.last_synced_at),
    }
}

fn newer_than_sync(updated_at: Stamp, last_synced_at: Option<Stamp>) -> bool {
    last_synced_at.is_none_or(|synced| updated_at > synced)
}

fn conflict_type(local: &SyncRecord, cloud: &SyncRecord) -> ConflictType {
    match (local.is_tombstone(), cloud.is_tombstone()) {
        (true, false) => ConflictType::LocalDeletedCloudUpdated,
        (false, true) => ConflictType::CloudDeletedLocalUpdated,
        _ => ConflictType::BothUpdated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordBody, RecordId, SyncEnvelope, Table};
    use serde_json::{json, Map};

    fn record(title: &str, status: SyncStatus, updated: i64, synced: Option<i64>) -> SyncRecord {
        let mut data = Map::new();
        data.insert("title".to_string(), json!(title));
        SyncRecord {
            envelope: SyncEnvelope {
                table: Table::Task,
                id: RecordId::default(),
                user_id: "alice".to_string(),
                updated_at: Stamp::from_millis(updated),
                sync_status: status,
                last_synced_at: synced.map(Stamp::from_millis),
                deleted: false,
            },
            data,
        }
    }

    fn with_id(mut record: SyncRecord, id: RecordId) -> SyncRecord {
        record.envelope.id = id;
        record
    }

    fn stored(record: SyncRecord, base: Option<&str>) -> StoredRecord {
        let base = base.map(|title| {
            let mut data = Map::new();
            data.insert("title".to_string(), json!(title));
            RecordBody {
                deleted: false,
                data,
            }
        });
        StoredRecord { record, base }
    }

    #[test]
    fn one_sided_records() {
        let local = stored(record("a", SyncStatus::Pending, 10, None), None);
        assert_eq!(ConflictDetector::detect(Some(&local), None), Detection::LocalOnly);

        let cloud = record("a", SyncStatus::Synced, 10, Some(10));
        assert_eq!(ConflictDetector::detect(None, Some(&cloud)), Detection::CloudOnly);

        let mut tombstone = cloud;
        tombstone.envelope.deleted = true;
        assert_eq!(
            ConflictDetector::detect(None, Some(&tombstone)),
            Detection::Unchanged
        );
    }

    #[test]
    fn cloud_deletion_of_unchanged_record_is_a_cloud_change() {
        let local = stored(record("a", SyncStatus::Synced, 10, Some(11)), Some("a"));
        assert_eq!(
            ConflictDetector::detect(Some(&local), None),
            Detection::CloudOnlyChange
        );
    }

    #[test]
    fn cloud_deletion_of_edited_record_conflicts() {
        let local = stored(record("b", SyncStatus::Pending, 20, Some(11)), Some("a"));
        assert_eq!(
            ConflictDetector::detect(Some(&local), None),
            Detection::Conflicting(ConflictType::CloudDeletedLocalUpdated)
        );

        let conflict = ConflictDetector::conflict(
            &local,
            None,
            ConflictType::CloudDeletedLocalUpdated,
            Stamp::from_millis(30),
        );
        assert!(conflict.cloud_data.is_tombstone());
        assert_eq!(conflict.cloud_data.envelope.updated_at, Stamp::from_millis(11));
    }

    #[test]
    fn base_drives_change_detection_despite_clock_skew() {
        let id = RecordId::new();
        // Cloud clock runs behind: its edit carries an older stamp than our last sync.
        let local = stored(
            with_id(record("a", SyncStatus::Synced, 10, Some(50)), id),
            Some("a"),
        );
        let cloud = with_id(record("edited", SyncStatus::Synced, 5, Some(5)), id);
        assert_eq!(
            ConflictDetector::detect(Some(&local), Some(&cloud)),
            Detection::CloudOnlyChange
        );
    }

    #[test]
    fn single_sided_changes() {
        let id = RecordId::new();
        let local = stored(
            with_id(record("mine", SyncStatus::Pending, 20, Some(11)), id),
            Some("a"),
        );
        let cloud = with_id(record("a", SyncStatus::Synced, 10, Some(11)), id);
        assert_eq!(
            ConflictDetector::detect(Some(&local), Some(&cloud)),
            Detection::LocalOnlyChange
        );

        let unchanged = stored(
            with_id(record("a", SyncStatus::Synced, 10, Some(11)), id),
            Some("a"),
        );
        assert_eq!(
            ConflictDetector::detect(Some(&unchanged), Some(&cloud)),
            Detection::Unchanged
        );
    }

    #[test]
    fn both_changed() {
        let id = RecordId::new();
        let local = stored(
            with_id(record("mine", SyncStatus::Pending, 20, Some(11)), id),
            Some("a"),
        );
        let cloud = with_id(record("theirs", SyncStatus::Synced, 21, Some(21)), id);
        assert_eq!(
            ConflictDetector::detect(Some(&local), Some(&cloud)),
            Detection::Conflicting(ConflictType::BothUpdated)
        );

        let same = with_id(record("mine", SyncStatus::Synced, 21, Some(21)), id);
        assert_eq!(
            ConflictDetector::detect(Some(&local), Some(&same)),
            Detection::Converged
        );

        let mut deleted = cloud;
        deleted.envelope.deleted = true;
        assert_eq!(
            ConflictDetector::detect(Some(&local), Some(&deleted)),
            Detection::Conflicting(ConflictType::CloudDeletedLocalUpdated)
        );
    }

    #[test]
    fn local_tombstone_against_cloud_edit() {
        let id = RecordId::new();
        let mut local = with_id(record("a", SyncStatus::DeletedPending, 20, Some(11)), id);
        local.envelope.deleted = true;
        let cloud = with_id(record("theirs", SyncStatus::Synced, 21, Some(21)), id);
        assert_eq!(
            ConflictDetector::detect(Some(&stored(local, Some("a"))), Some(&cloud)),
            Detection::Conflicting(ConflictType::LocalDeletedCloudUpdated)
        );
    }

    #[test]
    fn without_base_differing_bodies_count_as_cloud_change() {
        let id = RecordId::new();
        let local = stored(
            with_id(record("a", SyncStatus::Synced, 10, Some(50)), id),
            None,
        );
        let cloud = with_id(record("b", SyncStatus::Synced, 5, Some(5)), id);
        assert_eq!(
            ConflictDetector::detect(Some(&local), Some(&cloud)),
            Detection::CloudOnlyChange
        );
    }
}
