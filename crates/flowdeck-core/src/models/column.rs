//! Board column model

use serde::{Deserialize, Serialize};

use super::{Entity, Table};

/// A kanban column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub title: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub color: Option<String>,
}

impl Column {
    #[must_use]
    pub fn new(title: impl Into<String>, position: i64) -> Self {
        Self {
            title: title.into(),
            position,
            color: None,
        }
    }
}

impl Entity for Column {
    const TABLE: Table = Table::Column;
}
