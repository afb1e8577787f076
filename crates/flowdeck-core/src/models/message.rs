//! Chat message model

use serde::{Deserialize, Serialize};

use super::{Entity, Table};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Assistant,
    System,
}

/// One message of a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub conversation_id: String,
    #[serde(default)]
    pub role: MessageRole,
    pub content: String,
    /// Model that produced an assistant message
    #[serde(default)]
    pub model: Option<String>,
}

impl Message {
    #[must_use]
    pub fn new(
        conversation_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            model: None,
        }
    }
}

impl Entity for Message {
    const TABLE: Table = Table::Message;
}
