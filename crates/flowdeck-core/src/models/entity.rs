//! Typed view over a syncable row

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{RecordId, SyncEnvelope, SyncRecord, SyncStatus, Table};
use crate::error::{Error, Result};

/// Domain fields of one table.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;

    /// Domain fields as the JSON object stored in `SyncRecord::data`.
    fn to_data(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::InvalidInput(format!(
                "{} fields must serialize to an object, got {other}",
                Self::TABLE
            ))),
        }
    }
}

/// A persisted entity with its sync envelope populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<T> {
    #[serde(flatten)]
    pub envelope: SyncEnvelope,
    #[serde(flatten)]
    pub fields: T,
}

impl<T: Entity> Record<T> {
    pub const fn id(&self) -> RecordId {
        self.envelope.id
    }

    pub const fn sync_status(&self) -> SyncStatus {
        self.envelope.sync_status
    }

    /// Decode a table-agnostic row into this entity type.
    pub fn from_sync(record: SyncRecord) -> Result<Self> {
        if record.envelope.table != T::TABLE {
            return Err(Error::InvalidInput(format!(
                "record {} belongs to {}, not {}",
                record.envelope.id,
                record.envelope.table,
                T::TABLE
            )));
        }
        let fields = serde_json::from_value(Value::Object(record.data))?;
        Ok(Self {
            envelope: record.envelope,
            fields,
        })
    }

    /// Encode back into a table-agnostic row.
    pub fn into_sync(self) -> Result<SyncRecord> {
        let data = self.fields.to_data()?;
        Ok(SyncRecord {
            envelope: self.envelope,
            data,
        })
    }
}
