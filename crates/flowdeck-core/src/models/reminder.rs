//! Reminder model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, RecordId, Table};

/// A timed reminder, optionally attached to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub remind_at: DateTime<Utc>,
    #[serde(default)]
    pub task_id: Option<RecordId>,
    #[serde(default)]
    pub completed: bool,
}

impl Reminder {
    #[must_use]
    pub fn new(title: impl Into<String>, remind_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            remind_at,
            task_id: None,
            completed: false,
        }
    }
}

impl Entity for Reminder {
    const TABLE: Table = Table::Reminder;
}
