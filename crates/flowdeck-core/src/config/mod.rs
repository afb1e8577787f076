//! Cloud and sync configuration.
//!
//! `CloudConfig` is shared by the CLI and any other front end to describe the
//! remote record store and how often the sync engine talks to it.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;
const DEFAULT_TABLE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Configuration for the cloud record store and sync scheduling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudConfig {
    /// Base URL of the record store API (e.g., `https://api.example.com`)
    pub base_url: Option<String>,
    /// Bearer token for the record store API
    pub auth_token: Option<String>,
    /// Automatic sync interval; `None` means manual sync only
    pub sync_interval: Option<Duration>,
    /// Upper bound for one table's pull/detect/apply within a pass
    pub table_timeout: Duration,
    /// Timeout of a single HTTP request
    pub request_timeout: Duration,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_token: None,
            sync_interval: None,
            table_timeout: Duration::from_secs(DEFAULT_TABLE_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl CloudConfig {
    /// Create a new cloud configuration
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            auth_token: Some(auth_token.into()),
            sync_interval: Some(Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS)),
            ..Self::default()
        }
    }

    /// Set the automatic sync interval
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Disable automatic sync (manual sync only)
    #[must_use]
    pub const fn without_auto_sync(mut self) -> Self {
        self.sync_interval = None;
        self
    }

    /// Set the per-table timeout of a sync pass
    #[must_use]
    pub const fn with_table_timeout(mut self, timeout: Duration) -> Self {
        self.table_timeout = timeout;
        self
    }

    /// Check if a remote store is configured
    pub const fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.auth_token.is_some()
    }

    /// Validated base URL without trailing slash
    pub fn normalized_base_url(&self) -> Result<String> {
        let url = normalize_text_option(self.base_url.clone()).ok_or_else(|| {
            Error::InvalidInput("cloud base URL must not be empty".to_string())
        })?;
        if is_http_url(&url) {
            Ok(url.trim_end_matches('/').to_string())
        } else {
            Err(Error::InvalidInput(
                "cloud base URL must include http:// or https://".to_string(),
            ))
        }
    }

    /// Validated bearer token
    pub fn normalized_token(&self) -> Result<String> {
        normalize_text_option(self.auth_token.clone())
            .ok_or_else(|| Error::InvalidInput("cloud auth token must not be empty".to_string()))
    }
}
