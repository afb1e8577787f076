//! Persisted application settings

use serde::{Deserialize, Serialize};

use super::DatabaseMode;

/// Settings kept in the local database across restarts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Mode the next start resumes in; `None` until a mode was chosen
    pub mode: Option<DatabaseMode>,
    /// Tenant the local data belongs to
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert!(settings.mode.is_none());
        assert!(settings.user_id.is_none());
    }
}
