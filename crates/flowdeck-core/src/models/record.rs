//! Sync envelope shared by every table row

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::Table;
use crate::error::Error;

/// A unique identifier for a record, using UUID v7 (time-sortable).
///
/// Ids are stable across the local and cloud stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Hybrid logical timestamp: wall clock at millisecond precision plus a
/// logical counter that orders edits sharing the same millisecond.
///
/// The text form is RFC 3339 with milliseconds; a non-zero counter is
/// appended as `#<n>`, e.g. `2026-10-18T10:00:00.000Z#2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp {
    wall: DateTime<Utc>,
    logical: u32,
}

impl Stamp {
    /// Current wall clock, truncated to milliseconds, logical counter zero.
    pub fn now() -> Self {
        Self::from_millis(Utc::now().timestamp_millis())
    }

    /// Stamp at the given Unix millisecond.
    pub fn from_millis(millis: i64) -> Self {
        Self {
            wall: DateTime::from_timestamp_millis(millis).unwrap_or_default(),
            logical: 0,
        }
    }

    /// Stamp at the given wall time (sub-millisecond precision is dropped).
    pub fn at(wall: DateTime<Utc>) -> Self {
        Self::from_millis(wall.timestamp_millis())
    }

    /// Same wall time, next logical tick.
    #[must_use]
    pub const fn successor(self) -> Self {
        Self {
            wall: self.wall,
            logical: self.logical.saturating_add(1),
        }
    }

    pub const fn wall(&self) -> DateTime<Utc> {
        self.wall
    }

    pub const fn logical(&self) -> u32 {
        self.logical
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.wall.to_rfc3339_opts(SecondsFormat::Millis, true)
        )?;
        if self.logical > 0 {
            write!(f, "#{}", self.logical)?;
        }
        Ok(())
    }
}

impl FromStr for Stamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (wall, logical) = match s.trim().split_once('#') {
            Some((wall, logical)) => {
                let logical = logical
                    .parse::<u32>()
                    .map_err(|_| Error::InvalidInput(format!("invalid stamp counter: {s}")))?;
                (wall, logical)
            }
            None => (s.trim(), 0),
        };
        let wall = DateTime::parse_from_rfc3339(wall)
            .map_err(|error| Error::InvalidInput(format!("invalid stamp {s}: {error}")))?
            .with_timezone(&Utc);
        Ok(Self { wall, logical })
    }
}

impl Serialize for Stamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Stamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-record synchronization state.
///
/// A closed set: detector and resolver match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    /// Identical in both stores as of `last_synced_at`
    Synced,
    /// Local mutation not yet pushed
    #[default]
    Pending,
    /// Local deletion (tombstone) not yet pushed
    DeletedPending,
    /// Divergent edits surfaced for resolution
    Conflict,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::DeletedPending => "deleted-pending",
            Self::Conflict => "conflict",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(Self::Synced),
            "pending" => Ok(Self::Pending),
            "deleted-pending" => Ok(Self::DeletedPending),
            "conflict" => Ok(Self::Conflict),
            other => Err(Error::InvalidInput(format!("unknown sync status: {other}"))),
        }
    }
}

/// Envelope fields carried by every syncable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    pub table: Table,
    pub id: RecordId,
    pub user_id: String,
    pub updated_at: Stamp,
    pub sync_status: SyncStatus,
    #[serde(default)]
    pub last_synced_at: Option<Stamp>,
    /// Tombstone flag
    #[serde(default)]
    pub deleted: bool,
}

/// Table-agnostic row: envelope plus domain fields as a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    #[serde(flatten)]
    pub envelope: SyncEnvelope,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl SyncRecord {
    pub const fn id(&self) -> RecordId {
        self.envelope.id
    }

    pub const fn table(&self) -> Table {
        self.envelope.table
    }

    pub const fn is_tombstone(&self) -> bool {
        self.envelope.deleted
    }

    /// Content part of the record, without the envelope bookkeeping.
    pub fn body(&self) -> RecordBody {
        RecordBody {
            deleted: self.envelope.deleted,
            data: self.data.clone(),
        }
    }

    /// Whether both records carry the same content.
    pub fn same_content(&self, other: &Self) -> bool {
        if self.envelope.deleted && other.envelope.deleted {
            return true;
        }
        self.envelope.deleted == other.envelope.deleted && self.data == other.data
    }

    /// Whether this record's content matches a reconciled body.
    pub fn matches_body(&self, body: &RecordBody) -> bool {
        if self.envelope.deleted && body.deleted {
            return true;
        }
        self.envelope.deleted == body.deleted && self.data == body.data
    }
}

/// Record content last reconciled with the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordBody {
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_parse() {
        let id = RecordId::new();
        let parsed: RecordId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_stamp_text_form() {
        let stamp = Stamp::from_millis(1_700_000_000_123);
        assert_eq!(stamp.to_string(), "2023-11-14T22:13:20.123Z");
        assert_eq!(stamp.successor().to_string(), "2023-11-14T22:13:20.123Z#1");

        let parsed: Stamp = "2023-11-14T22:13:20.123Z#1".parse().unwrap();
        assert_eq!(parsed, stamp.successor());
    }

    #[test]
    fn test_stamp_orders_by_wall_then_counter() {
        let early = Stamp::from_millis(1_000);
        let same_ms = early.successor();
        let later = Stamp::from_millis(1_001);
        assert!(early < same_ms);
        assert!(same_ms < later);
    }

    #[test]
    fn test_stamp_rejects_garbage() {
        assert!("yesterday".parse::<Stamp>().is_err());
        assert!("2023-11-14T22:13:20.123Z#x".parse::<Stamp>().is_err());
    }

    #[test]
    fn test_sync_status_wire_names() {
        let json = serde_json::to_string(&SyncStatus::DeletedPending).unwrap();
        assert_eq!(json, "\"deleted-pending\"");
        assert_eq!(
            "deleted-pending".parse::<SyncStatus>().unwrap(),
            SyncStatus::DeletedPending
        );
        assert!("syncing".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_tombstones_share_content_regardless_of_data() {
        let mut data = Map::new();
        data.insert("title".to_string(), Value::from("a"));
        let envelope = SyncEnvelope {
            table: Table::Task,
            id: RecordId::new(),
            user_id: "u1".to_string(),
            updated_at: Stamp::now(),
            sync_status: SyncStatus::DeletedPending,
            last_synced_at: None,
            deleted: true,
        };
        let left = SyncRecord {
            envelope: envelope.clone(),
            data,
        };
        let right = SyncRecord {
            envelope,
            data: Map::new(),
        };
        assert!(left.same_content(&right));
    }

    #[test]
    fn test_sync_record_wire_shape() {
        let record = SyncRecord {
            envelope: SyncEnvelope {
                table: Table::Column,
                id: RecordId::new(),
                user_id: "u1".to_string(),
                updated_at: Stamp::from_millis(0),
                sync_status: SyncStatus::Synced,
                last_synced_at: None,
                deleted: false,
            },
            data: Map::new(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["table"], "columns");
        assert_eq!(value["sync_status"], "synced");
        assert_eq!(value["updated_at"], "1970-01-01T00:00:00.000Z");
        assert!(value["last_synced_at"].is_null());
    }
}
