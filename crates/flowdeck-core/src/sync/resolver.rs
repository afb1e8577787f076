//! Turns a conflict and a caller's choice into one reconciled record.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::models::{RecordBody, RecordId, Resolution, SyncConflict, SyncRecord, SyncStatus, Table};

/// Which version a field group was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Cloud,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        })
    }
}

/// A merge decision made by recency because both sides touched the same fields.
///
/// Non-fatal: the merge still produces a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeWarning {
    pub table: Table,
    pub id: RecordId,
    pub fields: Vec<String>,
    pub kept: Side,
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}: [{}] changed on both sides, kept {}",
            self.table,
            self.id,
            self.fields.join(", "),
            self.kept
        )
    }
}

/// Result of reconciling a conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub record: SyncRecord,
    pub warnings: Vec<MergeWarning>,
}

pub struct ConflictResolver;

impl ConflictResolver {
    /// Deterministic: the same conflict and choice always yield the same record.
    pub fn reconcile(conflict: &SyncConflict, resolution: Resolution) -> Reconciled {
        let local = &conflict.local_data;
        let cloud = &conflict.cloud_data;

        let (body, warnings) = match resolution {
            Resolution::Local => (local.body(), Vec::new()),
            Resolution::Cloud => (cloud.body(), Vec::new()),
            Resolution::Merge => merge(conflict),
        };

        let mut record = local.clone();
        record.envelope.updated_at = local.envelope.updated_at.max(cloud.envelope.updated_at);
        record.envelope.sync_status = SyncStatus::Synced;
        record.envelope.deleted = body.deleted;
        record.data = body.data;

        Reconciled { record, warnings }
    }
}

/// Side winning a two-way tie: the later edit, cloud when stamps are equal.
fn recency_winner(local: &SyncRecord, cloud: &SyncRecord) -> Side {
    if local.envelope.updated_at > cloud.envelope.updated_at {
        Side::Local
    } else {
        Side::Cloud
    }
}

fn merge(conflict: &SyncConflict) -> (RecordBody, Vec<MergeWarning>) {
    let local = &conflict.local_data;
    let cloud = &conflict.cloud_data;
    let warning = |fields: Vec<String>, kept: Side| MergeWarning {
        table: conflict.table,
        id: conflict.id,
        fields,
        kept,
    };

    if local.is_tombstone() || cloud.is_tombstone() {
        let kept = recency_winner(local, cloud);
        let body = match kept {
            Side::Local => local.body(),
            Side::Cloud => cloud.body(),
        };
        return (body, vec![warning(vec!["deleted".to_string()], kept)]);
    }

    let base = conflict.base.as_ref().filter(|base| !base.deleted);
    let empty = Map::new();
    let base_data = base.map_or(&empty, |base| &base.data);
    let mut merged = Map::new();
    let mut warnings = Vec::new();

    for group in field_groups(conflict.table, &local.data, &cloud.data, base_data) {
        let local_values = pick(&local.data, &group);
        let cloud_values = pick(&cloud.data, &group);

        let side = if local_values == cloud_values {
            Side::Local
        } else {
            let base_values = base.map(|base| pick(&base.data, &group));
            match base_values {
                Some(base_values) if local_values == base_values => Side::Cloud,
                Some(base_values) if cloud_values == base_values => Side::Local,
                _ => {
                    let kept = recency_winner(local, cloud);
                    warnings.push(warning(group.clone(), kept));
                    kept
                }
            }
        };

        let source = match side {
            Side::Local => &local.data,
            Side::Cloud => &cloud.data,
        };
        for field in &group {
            if let Some(value) = source.get(field) {
                merged.insert(field.clone(), value.clone());
            }
        }
    }

    for field in conflict.table.list_fields() {
        if let Some(value) = union(local.data.get(*field), cloud.data.get(*field)) {
            merged.insert((*field).to_string(), value);
        }
    }

    (
        RecordBody {
            deleted: false,
            data: merged,
        },
        warnings,
    )
}

/// Declared groups first, then every other scalar field as its own group.
fn field_groups(
    table: Table,
    local: &Map<String, Value>,
    cloud: &Map<String, Value>,
    base: &Map<String, Value>,
) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = table
        .merge_groups()
        .iter()
        .map(|group| group.iter().map(|field| (*field).to_string()).collect())
        .collect();

    let claimed: BTreeSet<&str> = table
        .merge_groups()
        .iter()
        .flat_map(|group| group.iter().copied())
        .chain(table.list_fields().iter().copied())
        .collect();

    let loose: BTreeSet<&String> = local
        .keys()
        .chain(cloud.keys())
        .chain(base.keys())
        .filter(|field| !claimed.contains(field.as_str()))
        .collect();
    groups.extend(loose.into_iter().map(|field| vec![field.clone()]));
    groups
}

fn pick<'a>(data: &'a Map<String, Value>, group: &[String]) -> Vec<Option<&'a Value>> {
    group.iter().map(|field| data.get(field)).collect()
}

/// Local items in order, then cloud items not already present.
fn union(local: Option<&Value>, cloud: Option<&Value>) -> Option<Value> {
    match (local, cloud) {
        (Some(Value::Array(local)), Some(Value::Array(cloud))) => {
            let mut items = local.clone();
            for item in cloud {
                if !items.contains(item) {
                    items.push(item.clone());
                }
            }
            Some(Value::Array(items))
        }
        (Some(value), _) | (None, Some(value)) => Some(value.clone()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictType, Entity, Priority, Stamp, SyncEnvelope, Task, TaskStatus};
    use pretty_assertions::assert_eq;

    fn envelope(id: RecordId, updated: i64) -> SyncEnvelope {
        SyncEnvelope {
            table: Table::Task,
            id,
            user_id: "alice".to_string(),
            updated_at: Stamp::from_millis(updated),
            sync_status: SyncStatus::Conflict,
            last_synced_at: Some(Stamp::from_millis(100)),
            deleted: false,
        }
    }

    fn conflict(base: &Task, local: (&Task, i64), cloud: (&Task, i64)) -> SyncConflict {
        let id = RecordId::new();
        SyncConflict {
            id,
            table: Table::Task,
            conflict_type: ConflictType::BothUpdated,
            local_data: SyncRecord {
                envelope: envelope(id, local.1),
                data: local.0.to_data().unwrap(),
            },
            cloud_data: SyncRecord {
                envelope: envelope(id, cloud.1),
                data: cloud.0.to_data().unwrap(),
            },
            base: Some(RecordBody {
                deleted: false,
                data: base.to_data().unwrap(),
            }),
            detected_at: Stamp::from_millis(300),
        }
    }

    fn task_of(record: &SyncRecord) -> Task {
        serde_json::from_value(Value::Object(record.data.clone())).unwrap()
    }

    #[test]
    fn local_and_cloud_pick_a_side_and_take_latest_stamp() {
        let base = Task::new("Buy milk");
        let mine = Task::new("Buy oat milk");
        let theirs = Task::new("Buy milk x2");
        let conflict = conflict(&base, (&mine, 200), (&theirs, 250));

        let local = ConflictResolver::reconcile(&conflict, Resolution::Local);
        assert_eq!(task_of(&local.record), mine);
        assert_eq!(local.record.envelope.updated_at, Stamp::from_millis(250));
        assert_eq!(local.record.envelope.sync_status, SyncStatus::Synced);
        assert!(local.warnings.is_empty());

        let cloud = ConflictResolver::reconcile(&conflict, Resolution::Cloud);
        assert_eq!(task_of(&cloud.record), theirs);
    }

    #[test]
    fn merge_takes_each_group_from_the_side_that_changed_it() {
        let base = Task::new("Buy milk");
        let mut mine = base.clone();
        mine.title = "Buy oat milk".to_string();
        let mut theirs = base.clone();
        theirs.status = TaskStatus::Done;
        theirs.priority = Priority::High;

        let merged = ConflictResolver::reconcile(
            &conflict(&base, (&mine, 200), (&theirs, 150)),
            Resolution::Merge,
        );
        let task = task_of(&merged.record);
        assert_eq!(task.title, "Buy oat milk");
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.priority, Priority::High);
        assert!(merged.warnings.is_empty());
    }

    #[test]
    fn merge_of_same_group_warns_and_keeps_later_side() {
        let base = Task::new("Buy milk");
        let mut mine = base.clone();
        mine.title = "Buy oat milk".to_string();
        let mut theirs = base.clone();
        theirs.description = "2 litres".to_string();

        let merged = ConflictResolver::reconcile(
            &conflict(&base, (&mine, 200), (&theirs, 250)),
            Resolution::Merge,
        );
        assert_eq!(task_of(&merged.record), theirs);
        assert_eq!(merged.warnings.len(), 1);
        assert_eq!(merged.warnings[0].kept, Side::Cloud);
        assert_eq!(merged.warnings[0].fields, vec!["title", "description"]);
    }

    #[test]
    fn equal_stamps_favor_cloud() {
        let base = Task::new("a");
        let conflict = conflict(&base, (&Task::new("b"), 200), (&Task::new("c"), 200));
        let merged = ConflictResolver::reconcile(&conflict, Resolution::Merge);
        assert_eq!(task_of(&merged.record).title, "c");
    }

    #[test]
    fn merge_unions_tags() {
        let base = Task::new("a").with_tags(["home"]);
        let mine = Task::new("a").with_tags(["home", "urgent"]);
        let theirs = Task::new("a").with_tags(["errand", "home"]);
        let merged = ConflictResolver::reconcile(
            &conflict(&base, (&mine, 200), (&theirs, 250)),
            Resolution::Merge,
        );
        assert_eq!(task_of(&merged.record).tags, vec!["home", "urgent", "errand"]);
    }

    #[test]
    fn merge_is_deterministic() {
        let base = Task::new("a");
        let mut mine = base.clone();
        mine.position = 3;
        mine.title = "mine".to_string();
        let mut theirs = base.clone();
        theirs.title = "theirs".to_string();
        let conflict = conflict(&base, (&mine, 200), (&theirs, 180));

        let first = ConflictResolver::reconcile(&conflict, Resolution::Merge);
        for _ in 0..10 {
            assert_eq!(ConflictResolver::reconcile(&conflict, Resolution::Merge), first);
        }
    }

    #[test]
    fn tombstone_against_edit_keeps_later_side_wholesale() {
        let base = Task::new("a");
        let mut conflict = conflict(&base, (&Task::new("b"), 400), (&base, 250));
        conflict.cloud_data.envelope.deleted = true;
        conflict.conflict_type = ConflictType::CloudDeletedLocalUpdated;

        let merged = ConflictResolver::reconcile(&conflict, Resolution::Merge);
        assert!(!merged.record.is_tombstone());
        assert_eq!(task_of(&merged.record).title, "b");
        assert_eq!(merged.warnings[0].fields, vec!["deleted"]);

        let cloud = ConflictResolver::reconcile(&conflict, Resolution::Cloud);
        assert!(cloud.record.is_tombstone());
    }
}
