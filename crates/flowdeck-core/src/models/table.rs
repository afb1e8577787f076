//! Syncable tables and their merge layout

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A syncable table.
///
/// Declaration order is the push priority within a sync pass: tables that
/// others reference (a task's `column_id`) come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Table {
    #[serde(rename = "api_keys")]
    ApiKey,
    #[serde(rename = "columns")]
    Column,
    #[serde(rename = "tasks")]
    Task,
    #[serde(rename = "reminders")]
    Reminder,
    #[serde(rename = "messages")]
    Message,
}

impl Table {
    /// Fixed traversal order of a sync pass.
    pub const SYNC_ORDER: [Self; 5] = [
        Self::ApiKey,
        Self::Column,
        Self::Task,
        Self::Reminder,
        Self::Message,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApiKey => "api_keys",
            Self::Column => "columns",
            Self::Task => "tasks",
            Self::Reminder => "reminders",
            Self::Message => "messages",
        }
    }

    /// Scalar fields that merge as a unit: one side wins the whole group.
    ///
    /// Fields absent from every group merge on their own.
    pub const fn merge_groups(self) -> &'static [&'static [&'static str]] {
        match self {
            Self::Task => &[
                &["title", "description"],
                &["status", "priority"],
                &["column_id", "position"],
                &["due_date"],
            ],
            Self::Column => &[&["title"], &["position"], &["color"]],
            Self::Reminder => &[
                &["title", "description"],
                &["remind_at"],
                &["task_id"],
                &["completed"],
            ],
            Self::Message => &[&["conversation_id", "role", "content"], &["model"]],
            Self::ApiKey => &[&["provider", "label"], &["key"]],
        }
    }

    /// List-valued fields merged by union instead of overwrite.
    pub const fn list_fields(self) -> &'static [&'static str] {
        match self {
            Self::Task => &["tags"],
            Self::Column | Self::Reminder | Self::Message | Self::ApiKey => &[],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SYNC_ORDER
            .into_iter()
            .find(|table| table.as_str() == s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("unknown table: {s}")))
    }
}
