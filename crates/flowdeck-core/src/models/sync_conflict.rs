//! Sync conflict model

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{RecordBody, RecordId, Stamp, SyncRecord, Table};

/// How the two sides diverged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    /// Both sides edited the record
    BothUpdated,
    /// Deleted locally, edited in the cloud
    LocalDeletedCloudUpdated,
    /// Deleted in the cloud, edited locally
    CloudDeletedLocalUpdated,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BothUpdated => "both-updated",
            Self::LocalDeletedCloudUpdated => "local-deleted-cloud-updated",
            Self::CloudDeletedLocalUpdated => "cloud-deleted-local-updated",
        })
    }
}

/// Divergent local and cloud versions of one record awaiting resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict identifier: the id of the record in conflict
    pub id: RecordId,
    pub table: Table,
    pub conflict_type: ConflictType,
    pub local_data: SyncRecord,
    pub cloud_data: SyncRecord,
    /// Content both sides last agreed on, when known
    #[serde(default)]
    pub base: Option<RecordBody>,
    /// When the conflict was first detected
    pub detected_at: Stamp,
}

/// Caller's choice for a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Keep the local version
    Local,
    /// Keep the cloud version
    Cloud,
    /// Field-group merge of both versions
    Merge,
}

impl std::str::FromStr for Resolution {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            "merge" => Ok(Self::Merge),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown resolution '{other}' (expected local, cloud or merge)"
            ))),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
            Self::Merge => "merge",
        })
    }
}
