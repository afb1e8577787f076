//! Owns the current façade and swaps it when the database mode changes.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use super::DatabaseService;
use crate::config::CloudConfig;
use crate::error::{Error, Result};
use crate::models::{DatabaseConfig, DatabaseMode, Settings};
use crate::store::{CloudConnector, LibSqlStore};

/// Inputs that stay fixed across mode switches.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Local database file; reopened for every façade
    pub db_path: PathBuf,
    pub user_id: String,
    /// Mode used when none was persisted yet
    pub default_mode: DatabaseMode,
    pub cloud: CloudConfig,
}

impl ControllerConfig {
    pub fn new(db_path: impl Into<PathBuf>, user_id: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            user_id: user_id.into(),
            default_mode: DatabaseMode::default(),
            cloud: CloudConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_default_mode(mut self, mode: DatabaseMode) -> Self {
        self.default_mode = mode;
        self
    }

    #[must_use]
    pub fn with_cloud(mut self, cloud: CloudConfig) -> Self {
        self.cloud = cloud;
        self
    }
}

pub struct ModeController {
    config: ControllerConfig,
    connector: Option<Arc<dyn CloudConnector>>,
    current: RwLock<Arc<DatabaseService>>,
    switching: Mutex<()>,
}

impl ModeController {
    /// Build the first façade in the persisted mode.
    ///
    /// A persisted cloud-backed mode without a connector starts in `local`.
    pub async fn open(
        config: ControllerConfig,
        connector: Option<Arc<dyn CloudConnector>>,
    ) -> Result<Self> {
        let local = LibSqlStore::open(&config.db_path).await?;
        let settings = local.load_settings().await?;
        let mut mode = settings.mode.unwrap_or(config.default_mode);
        if mode.uses_cloud() && connector.is_none() {
            tracing::warn!("No cloud store configured; starting in local mode instead of {mode}");
            mode = DatabaseMode::Local;
        }

        let facade = DatabaseService::open(
            DatabaseConfig::new(mode, config.user_id.clone()),
            local,
            connector.clone(),
            &config.cloud,
        )
        .await?;

        Ok(Self {
            config,
            connector,
            current: RwLock::new(Arc::new(facade)),
            switching: Mutex::new(()),
        })
    }

    /// The façade serving the current mode.
    pub fn facade(&self) -> Arc<DatabaseService> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn mode(&self) -> DatabaseMode {
        self.facade().mode()
    }

    /// Switch to `mode`, rebuilding the façade.
    ///
    /// The old façade's scheduler and any in-flight pass are aborted; callers
    /// still holding it get [`Error::Closed`]. Switching into `sync` starts a
    /// pass in the background. Setting the current mode again is a no-op.
    pub async fn set_mode(&self, mode: &str) -> Result<Arc<DatabaseService>> {
        let mode: DatabaseMode = mode.parse()?;
        let _switching = self.switching.lock().await;

        let previous = self.facade();
        if previous.mode() == mode {
            return Ok(previous);
        }
        if mode.uses_cloud() && self.connector.is_none() {
            return Err(Error::Offline(format!(
                "{mode} mode needs a configured cloud store"
            )));
        }

        let local = LibSqlStore::open(&self.config.db_path).await?;
        let facade = Arc::new(
            DatabaseService::open(
                DatabaseConfig::new(mode, self.config.user_id.clone()),
                local,
                self.connector.clone(),
                &self.config.cloud,
            )
            .await?,
        );

        previous.shutdown();
        Self::persist(&facade, mode, &self.config.user_id).await?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&facade);
        tracing::info!("Switched database mode {} -> {mode}", previous.mode());

        if mode == DatabaseMode::Sync {
            let syncing = Arc::clone(&facade);
            tokio::spawn(async move {
                match syncing.sync().await {
                    Ok(_) => {}
                    Err(Error::Cancelled | Error::Closed) => {
                        tracing::debug!("Initial sync after mode switch was cancelled");
                    }
                    Err(error) => tracing::warn!("Initial sync after mode switch failed: {error}"),
                }
            });
        }

        Ok(facade)
    }

    async fn persist(facade: &DatabaseService, mode: DatabaseMode, user_id: &str) -> Result<()> {
        facade
            .local_store()
            .save_settings(&Settings {
                mode: Some(mode),
                user_id: Some(user_id.to_string()),
            })
            .await
    }
}
