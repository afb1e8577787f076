//! Database mode and façade configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which stores the façade routes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseMode {
    /// Local store only, fully offline
    #[default]
    Local,
    /// Cloud store only
    Cloud,
    /// Local store first, reconciled with the cloud by sync passes
    Sync,
}

impl DatabaseMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
            Self::Sync => "sync",
        }
    }

    pub const fn uses_local(self) -> bool {
        matches!(self, Self::Local | Self::Sync)
    }

    pub const fn uses_cloud(self) -> bool {
        matches!(self, Self::Cloud | Self::Sync)
    }
}

impl fmt::Display for DatabaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            "sync" => Ok(Self::Sync),
            _ => Err(Error::UnsupportedMode(s.to_string())),
        }
    }
}

/// Configuration of one façade instance; a mode change builds a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    mode: DatabaseMode,
    user_id: String,
}

impl DatabaseConfig {
    pub fn new(mode: DatabaseMode, user_id: impl Into<String>) -> Self {
        Self {
            mode,
            user_id: user_id.into(),
        }
    }

    pub const fn mode(&self) -> DatabaseMode {
        self.mode
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("local".parse::<DatabaseMode>().unwrap(), DatabaseMode::Local);
        assert_eq!(" Sync ".parse::<DatabaseMode>().unwrap(), DatabaseMode::Sync);
        assert_eq!("cloud".parse::<DatabaseMode>().unwrap(), DatabaseMode::Cloud);
    }

    #[test]
    fn test_unknown_mode_is_unsupported() {
        let error = "hybrid".parse::<DatabaseMode>().unwrap_err();
        assert!(matches!(error, Error::UnsupportedMode(mode) if mode == "hybrid"));
    }

    #[test]
    fn test_store_usage_per_mode() {
        assert!(DatabaseMode::Local.uses_local() && !DatabaseMode::Local.uses_cloud());
        assert!(!DatabaseMode::Cloud.uses_local() && DatabaseMode::Cloud.uses_cloud());
        assert!(DatabaseMode::Sync.uses_local() && DatabaseMode::Sync.uses_cloud());
    }
}
