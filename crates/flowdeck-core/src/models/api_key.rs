//! Stored model-provider API key

use serde::{Deserialize, Serialize};

use super::{Entity, Table};

/// API key for a hosted model provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    /// Provider slug (e.g. `openai`, `gemini`)
    pub provider: String,
    #[serde(default)]
    pub label: String,
    pub key: String,
}

impl ApiKey {
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        label: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            label: label.into(),
            key: key.into(),
        }
    }

    /// Key with everything but the last four characters masked.
    pub fn masked_key(&self) -> String {
        let visible: String = self
            .key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{visible}")
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ApiKey")
            .field("provider", &self.provider)
            .field("label", &self.label)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl Entity for ApiKey {
    const TABLE: Table = Table::ApiKey;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_debug_redacts_key() {
        let key = ApiKey::new("openai", "work", "sk-secret-1234");
        let debug = format!("{key:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn masked_key_keeps_last_four() {
        let key = ApiKey::new("gemini", "", "abcdef9876");
        assert_eq!(key.masked_key(), "****9876");
        assert_eq!(ApiKey::new("x", "", "ab").masked_key(), "****ab");
    }
}
