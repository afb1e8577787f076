//! Settings repository implementation

use crate::error::Result;
use crate::models::Settings;
use libsql::Connection;

const MODE_KEY: &str = "database_mode";
const USER_ID_KEY: &str = "user_id";

/// Trait for settings storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SettingsRepository {
    /// Load settings from the database
    async fn load(&self) -> Result<Settings>;

    /// Save settings to the database
    async fn save(&self, settings: &Settings) -> Result<()>;
}

/// libSQL implementation of `SettingsRepository`
pub struct LibSqlSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for LibSqlSettingsRepository<'_> {
    async fn load(&self) -> Result<Settings> {
        let mut settings = Settings::default();

        if let Some(value) = self.get_setting(MODE_KEY).await? {
            match value.parse() {
                Ok(mode) => settings.mode = Some(mode),
                Err(error) => {
                    tracing::warn!("Ignoring persisted mode '{value}': {error}");
                }
            }
        }

        settings.user_id = self.get_setting(USER_ID_KEY).await?;

        Ok(settings)
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        match settings.mode {
            Some(mode) => self.set_setting(MODE_KEY, mode.as_str()).await?,
            None => self.clear_setting(MODE_KEY).await?,
        }
        match settings.user_id.as_deref() {
            Some(user_id) => self.set_setting(USER_ID_KEY, user_id).await?,
            None => self.clear_setting(USER_ID_KEY).await?,
        }
        Ok(())
    }
}

impl LibSqlSettingsRepository<'_> {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }

    async fn clear_setting(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::DatabaseMode;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_default_settings() {
        let db = setup().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        let settings = repo.load().await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_and_load_settings() {
        let db = setup().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        let settings = Settings {
            mode: Some(DatabaseMode::Sync),
            user_id: Some("user-42".to_string()),
        };
        repo.save(&settings).await.unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, settings);

        repo.save(&Settings {
            user_id: None,
            ..settings
        })
        .await
        .unwrap();
        assert!(repo.load().await.unwrap().user_id.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_persisted_mode_falls_back_to_default() {
        let db = setup().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        repo.set_setting(MODE_KEY, "hybrid").await.unwrap();
        assert!(repo.load().await.unwrap().mode.is_none());
    }
}
