//! Kanban task model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, RecordId, Table};

/// Workflow status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// A task on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    /// Board column holding the task
    #[serde(default)]
    pub column_id: Option<RecordId>,
    /// Ordering within the column
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Task {
    /// Create a todo task with the given title
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            column_id: None,
            position: 0,
            due_date: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub const fn in_column(mut self, column_id: RecordId) -> Self {
        self.column_id = Some(column_id);
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

impl Entity for Task {
    const TABLE: Table = Table::Task;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_defaults_fill_missing_fields() {
        let task: Task = serde_json::from_str(r#"{"title":"Buy milk"}"#).unwrap();
        assert_eq!(task, Task::new("Buy milk"));
    }

    #[test]
    fn test_task_status_wire_names() {
        let value = serde_json::to_value(TaskStatus::InProgress).unwrap();
        assert_eq!(value, "in_progress");
    }
}
