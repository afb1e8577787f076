//! Record repository implementation

use libsql::{Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{RecordBody, RecordId, Stamp, SyncEnvelope, SyncRecord, SyncStatus, Table};

const SELECT_COLUMNS: &str = "table_name, id, user_id, updated_at, sync_status, last_synced_at, is_deleted, data, base";

/// A stored row together with the body it was last reconciled with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub record: SyncRecord,
    pub base: Option<RecordBody>,
}

/// libSQL repository over the `records` table
pub struct RecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> RecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// All rows of a table for a user, tombstones included, ordered by id
    pub async fn list(&self, table: Table, user_id: &str) -> Result<Vec<StoredRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM records
                     WHERE table_name = ? AND user_id = ?
                     ORDER BY id ASC"
                ),
                libsql::params![table.as_str(), user_id],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_row(&row)?);
        }
        Ok(records)
    }

    /// Fetch one row by id, tombstones included
    pub async fn get(&self, table: Table, id: &RecordId) -> Result<Option<StoredRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM records WHERE table_name = ? AND id = ?"),
                libsql::params![table.as_str(), id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert a new row; fails if the id already exists in the table
    pub async fn insert(&self, record: &SyncRecord) -> Result<()> {
        let envelope = &record.envelope;
        self.conn
            .execute(
                "INSERT INTO records (table_name, id, user_id, updated_at, sync_status, last_synced_at, is_deleted, data, base)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)",
                libsql::params![
                    envelope.table.as_str(),
                    envelope.id.as_str(),
                    envelope.user_id.as_str(),
                    envelope.updated_at.to_string(),
                    envelope.sync_status.as_str(),
                    optional_stamp(record),
                    i64::from(envelope.deleted),
                    serde_json::to_string(&record.data)?
                ],
            )
            .await?;
        Ok(())
    }

    /// Replace an existing row's envelope and data, keeping its base
    pub async fn update(&self, record: &SyncRecord) -> Result<()> {
        let envelope = &record.envelope;
        let rows = self
            .conn
            .execute(
                "UPDATE records
                 SET user_id = ?, updated_at = ?, sync_status = ?, last_synced_at = ?, is_deleted = ?, data = ?
                 WHERE table_name = ? AND id = ?",
                libsql::params![
                    envelope.user_id.as_str(),
                    envelope.updated_at.to_string(),
                    envelope.sync_status.as_str(),
                    optional_stamp(record),
                    i64::from(envelope.deleted),
                    serde_json::to_string(&record.data)?,
                    envelope.table.as_str(),
                    envelope.id.as_str()
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(envelope.id.to_string()));
        }
        Ok(())
    }

    /// Commit a reconciled row only while the stored row is still the one
    /// the caller read.
    ///
    /// `expected` is that row's `updated_at`; `None` means no row existed.
    /// Returns `false`, leaving the row untouched, when it moved since.
    pub async fn commit_synced_if(
        &self,
        record: &SyncRecord,
        expected: Option<Stamp>,
    ) -> Result<bool> {
        let Some(expected) = expected else {
            let envelope = &record.envelope;
            let rows = self
                .conn
                .execute(
                    &format!("INSERT OR IGNORE INTO records ({SELECT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"),
                    libsql::params![
                        envelope.table.as_str(),
                        envelope.id.as_str(),
                        envelope.user_id.as_str(),
                        envelope.updated_at.to_string(),
                        envelope.sync_status.as_str(),
                        optional_stamp(record),
                        i64::from(envelope.deleted),
                        serde_json::to_string(&record.data)?,
                        serde_json::to_string(&record.body())?
                    ],
                )
                .await?;
            return Ok(rows > 0);
        };

        let envelope = &record.envelope;
        let rows = self
            .conn
            .execute(
                "UPDATE records
                 SET user_id = ?, updated_at = ?, sync_status = ?, last_synced_at = ?, is_deleted = ?, data = ?, base = ?
                 WHERE table_name = ? AND id = ? AND updated_at = ?",
                libsql::params![
                    envelope.user_id.as_str(),
                    envelope.updated_at.to_string(),
                    envelope.sync_status.as_str(),
                    optional_stamp(record),
                    i64::from(envelope.deleted),
                    serde_json::to_string(&record.data)?,
                    serde_json::to_string(&record.body())?,
                    envelope.table.as_str(),
                    envelope.id.as_str(),
                    expected.to_string()
                ],
            )
            .await?;
        Ok(rows > 0)
    }

    /// Record `base` as the cloud's copy of a row without touching the row.
    ///
    /// Used when a push landed but the row was edited meanwhile: the edit
    /// stays pending and is compared against what the cloud now holds.
    pub async fn rebase(&self, record: &SyncRecord) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE records SET base = ?, last_synced_at = ? WHERE table_name = ? AND id = ?",
                libsql::params![
                    serde_json::to_string(&record.body())?,
                    optional_stamp(record),
                    record.table().as_str(),
                    record.id().as_str()
                ],
            )
            .await?;
        Ok(rows > 0)
    }

    /// Change only the sync status of a row
    pub async fn set_status(&self, table: Table, id: &RecordId, status: SyncStatus) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE records SET sync_status = ? WHERE table_name = ? AND id = ?",
                libsql::params![status.as_str(), table.as_str(), id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Physically remove a row
    pub async fn delete(&self, table: Table, id: &RecordId) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM records WHERE table_name = ? AND id = ?",
                libsql::params![table.as_str(), id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Physically remove a row unless it was written after `expected`
    pub async fn delete_if(&self, table: Table, id: &RecordId, expected: Stamp) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM records WHERE table_name = ? AND id = ? AND updated_at = ?",
                libsql::params![table.as_str(), id.as_str(), expected.to_string()],
            )
            .await?;
        Ok(rows > 0)
    }

    /// Count rows per sync status for a user
    pub async fn count_by_status(&self, user_id: &str) -> Result<Vec<(SyncStatus, i64)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT sync_status, COUNT(*) FROM records
                 WHERE user_id = ?
                 GROUP BY sync_status
                 ORDER BY sync_status ASC",
                libsql::params![user_id],
            )
            .await?;

        let mut counts = Vec::new();
        while let Some(row) = rows.next().await? {
            let status: String = row.get(0)?;
            counts.push((status.parse()?, row.get::<i64>(1)?));
        }
        Ok(counts)
    }

    /// Parse a record from a database row
    fn parse_row(row: &Row) -> Result<StoredRecord> {
        let table: String = row.get(0)?;
        let id: String = row.get(1)?;
        let updated_at: String = row.get(3)?;
        let sync_status: String = row.get(4)?;
        let data: String = row.get(7)?;

        let envelope = SyncEnvelope {
            table: table.parse()?,
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid record id in store: {id}")))?,
            user_id: row.get(2)?,
            updated_at: updated_at.parse()?,
            sync_status: sync_status.parse()?,
            last_synced_at: optional_text(row, 5)?
                .map(|value| value.parse())
                .transpose()?,
            deleted: row.get::<i64>(6)? != 0,
        };
        let base = optional_text(row, 8)?
            .map(|value| serde_json::from_str::<RecordBody>(&value))
            .transpose()?;

        Ok(StoredRecord {
            record: SyncRecord {
                envelope,
                data: serde_json::from_str(&data)?,
            },
            base,
        })
    }
}

fn optional_stamp(record: &SyncRecord) -> Value {
    record
        .envelope
        .last_synced_at
        .map_or(Value::Null, |stamp| Value::Text(stamp.to_string()))
}

fn optional_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Text(value) => Ok(Some(value)),
        Value::Null => Ok(None),
        other => Err(Error::Database(format!(
            "expected text in column {idx}, found {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Map};

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn sample(table: Table, title: &str) -> SyncRecord {
        let mut data = Map::new();
        data.insert("title".to_string(), json!(title));
        SyncRecord {
            envelope: SyncEnvelope {
                table,
                id: RecordId::new(),
                user_id: "user-1".to_string(),
                updated_at: Stamp::from_millis(1_000),
                sync_status: SyncStatus::Pending,
                last_synced_at: None,
                deleted: false,
            },
            data,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_get() {
        let db = setup().await;
        let repo = RecordRepository::new(db.connection());

        let record = sample(Table::Task, "Buy milk");
        repo.insert(&record).await.unwrap();

        let fetched = repo.get(Table::Task, &record.id()).await.unwrap().unwrap();
        assert_eq!(fetched.record, record);
        assert!(fetched.base.is_none());

        // Same id in another table is a different row
        assert!(repo.get(Table::Column, &record.id()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_duplicate_fails() {
        let db = setup().await;
        let repo = RecordRepository::new(db.connection());

        let record = sample(Table::Task, "once");
        repo.insert(&record).await.unwrap();
        assert!(repo.insert(&record).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_is_scoped_by_table_and_user() {
        let db = setup().await;
        let repo = RecordRepository::new(db.connection());

        repo.insert(&sample(Table::Task, "a")).await.unwrap();
        repo.insert(&sample(Table::Task, "b")).await.unwrap();
        repo.insert(&sample(Table::Column, "c")).await.unwrap();
        let mut other_user = sample(Table::Task, "d");
        other_user.envelope.user_id = "user-2".to_string();
        repo.insert(&other_user).await.unwrap();

        let tasks = repo.list(Table::Task, "user-1").await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].record.id() < tasks[1].record.id());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_keeps_base() {
        let db = setup().await;
        let repo = RecordRepository::new(db.connection());

        let mut record = sample(Table::Task, "v1");
        record.envelope.sync_status = SyncStatus::Synced;
        record.envelope.last_synced_at = Some(Stamp::from_millis(2_000));
        assert!(repo.commit_synced_if(&record, None).await.unwrap());

        let mut edited = record.clone();
        edited.data.insert("title".to_string(), json!("v2"));
        edited.envelope.sync_status = SyncStatus::Pending;
        edited.envelope.updated_at = Stamp::from_millis(3_000);
        repo.update(&edited).await.unwrap();

        let stored = repo.get(Table::Task, &record.id()).await.unwrap().unwrap();
        assert_eq!(stored.record, edited);
        assert_eq!(stored.base, Some(record.body()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_guarded_commit_skips_a_row_edited_since_it_was_read() {
        let db = setup().await;
        let repo = RecordRepository::new(db.connection());

        let read = sample(Table::Task, "v1");
        repo.insert(&read).await.unwrap();

        let mut edited = read.clone();
        edited.data.insert("title".to_string(), json!("v2"));
        edited.envelope.updated_at = Stamp::from_millis(5_000);
        repo.update(&edited).await.unwrap();

        let mut synced = read.clone();
        synced.envelope.sync_status = SyncStatus::Synced;
        synced.envelope.last_synced_at = Some(Stamp::from_millis(4_000));
        let written = repo
            .commit_synced_if(&synced, Some(read.envelope.updated_at))
            .await
            .unwrap();
        assert!(!written);

        let stored = repo.get(Table::Task, &read.id()).await.unwrap().unwrap();
        assert_eq!(stored.record, edited);
        assert!(stored.base.is_none());

        assert!(repo.rebase(&synced).await.unwrap());
        let stored = repo.get(Table::Task, &read.id()).await.unwrap().unwrap();
        assert_eq!(stored.record.data, edited.data);
        assert_eq!(stored.record.envelope.sync_status, SyncStatus::Pending);
        assert_eq!(
            stored.record.envelope.last_synced_at,
            Some(Stamp::from_millis(4_000))
        );
        assert_eq!(stored.base, Some(synced.body()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_guarded_commit_writes_an_unchanged_row() {
        let db = setup().await;
        let repo = RecordRepository::new(db.connection());

        let read = sample(Table::Column, "Todo");
        repo.insert(&read).await.unwrap();
        let mut synced = read.clone();
        synced.envelope.sync_status = SyncStatus::Synced;
        synced.envelope.last_synced_at = Some(Stamp::from_millis(2_000));

        assert!(repo
            .commit_synced_if(&synced, Some(read.envelope.updated_at))
            .await
            .unwrap());
        let stored = repo.get(Table::Column, &read.id()).await.unwrap().unwrap();
        assert_eq!(stored.record, synced);
        assert_eq!(stored.base, Some(synced.body()));

        // Expecting no row must not clobber one that appeared meanwhile
        let mut other = sample(Table::Column, "Doing");
        other.envelope.id = read.id();
        assert!(!repo.commit_synced_if(&other, None).await.unwrap());
        let fresh = sample(Table::Column, "Done");
        assert!(repo.commit_synced_if(&fresh, None).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_if_keeps_a_newer_row() {
        let db = setup().await;
        let repo = RecordRepository::new(db.connection());

        let record = sample(Table::Message, "hello");
        repo.insert(&record).await.unwrap();

        assert!(!repo
            .delete_if(Table::Message, &record.id(), Stamp::from_millis(999))
            .await
            .unwrap());
        assert!(repo.get(Table::Message, &record.id()).await.unwrap().is_some());
        assert!(repo
            .delete_if(Table::Message, &record.id(), record.envelope.updated_at)
            .await
            .unwrap());
        assert!(repo.get(Table::Message, &record.id()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_missing_is_not_found() {
        let db = setup().await;
        let repo = RecordRepository::new(db.connection());

        let error = repo.update(&sample(Table::Task, "ghost")).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_status_and_delete() {
        let db = setup().await;
        let repo = RecordRepository::new(db.connection());

        let record = sample(Table::Reminder, "call");
        repo.insert(&record).await.unwrap();
        repo.set_status(Table::Reminder, &record.id(), SyncStatus::Conflict)
            .await
            .unwrap();

        let counts = repo.count_by_status("user-1").await.unwrap();
        assert_eq!(counts, vec![(SyncStatus::Conflict, 1)]);

        repo.delete(Table::Reminder, &record.id()).await.unwrap();
        assert!(repo.get(Table::Reminder, &record.id()).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(Table::Reminder, &record.id()).await,
            Err(Error::NotFound(_))
        ));
    }
}
