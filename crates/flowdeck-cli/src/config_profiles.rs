//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use flowdeck_core::util::normalize_text_option;
use flowdeck_core::CloudConfig;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";
const DEFAULT_USER_ID: &str = "local";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub cloud_url: Option<String>,
    #[serde(default)]
    pub cloud_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Per-table timeout of a sync pass, in seconds
    #[serde(default)]
    pub table_timeout_secs: Option<u64>,
}

/// Values the CLI needs to open a [`flowdeck_core::ModeController`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    pub user_id: String,
    pub cloud: CloudConfig,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| panic!("Failed to resolve CLI config directory"))
        .join("flowdeck")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(ToString::to_string))
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(std::env::var("FLOWDECK_PROFILE").ok().as_deref()))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    /// Merge the named profile with `FLOWDECK_*` environment overrides.
    pub fn resolve(&self, explicit: Option<&str>) -> ResolvedProfile {
        let profile = self
            .profile(&self.resolve_profile_name(explicit))
            .cloned()
            .unwrap_or_default();
        profile.resolve_with(|key| std::env::var(key).ok())
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Environment values win over stored ones.
    pub fn resolve_with<F>(&self, env: F) -> ResolvedProfile
    where
        F: Fn(&str) -> Option<String>,
    {
        let cloud_url =
            normalize_text_option(env("FLOWDECK_CLOUD_URL")).or_else(|| self.cloud_url.clone());
        let cloud_token =
            normalize_text_option(env("FLOWDECK_CLOUD_TOKEN")).or_else(|| self.cloud_token.clone());
        let user_id = normalize_text_option(env("FLOWDECK_USER_ID"))
            .or_else(|| self.user_id.clone())
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string());

        // One-shot commands sync explicitly; no background scheduler.
        let mut cloud = CloudConfig {
            base_url: cloud_url,
            auth_token: cloud_token,
            ..CloudConfig::default()
        };
        if let Some(secs) = self.table_timeout_secs.filter(|secs| *secs > 0) {
            cloud = cloud.with_table_timeout(std::time::Duration::from_secs(secs));
        }

        ResolvedProfile { user_id, cloud }
    }

    fn normalize(&mut self) {
        self.cloud_url = normalize_text_option(self.cloud_url.clone());
        self.cloud_token = normalize_text_option(self.cloud_token.clone());
        self.user_id = normalize_text_option(self.user_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
        assert_eq!(normalize_profile_name(Some(" work ")), Some("work".to_string()));
    }

    #[test]
    fn config_roundtrip_preserves_profiles() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some(" default ".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "default".to_string(),
            CliProfile {
                cloud_url: Some(" https://api.example.com ".to_string()),
                cloud_token: Some(" secret ".to_string()),
                user_id: Some("alice".to_string()),
                table_timeout_secs: Some(5),
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.active_profile.as_deref(), Some("default"));
        let profile = loaded.profile("default").unwrap();
        assert_eq!(profile.cloud_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(profile.cloud_token.as_deref(), Some("secret"));
        assert_eq!(profile.table_timeout_secs, Some(5));
    }

    #[test]
    fn missing_config_file_loads_default() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = CliProfilesConfig::load_from_path(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliProfilesConfig::default());
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_active() {
        let config = CliProfilesConfig {
            version: 1,
            active_profile: Some("work".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(config.resolve_profile_name(Some("mobile")), "mobile");
    }

    #[test]
    fn environment_overrides_stored_values() {
        let profile = CliProfile {
            cloud_url: Some("https://stored.example.com".to_string()),
            cloud_token: Some("stored".to_string()),
            user_id: Some("alice".to_string()),
            table_timeout_secs: Some(3),
        };
        let resolved = profile.resolve_with(|key| match key {
            "FLOWDECK_CLOUD_URL" => Some("https://env.example.com".to_string()),
            "FLOWDECK_USER_ID" => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(
            resolved.cloud.base_url.as_deref(),
            Some("https://env.example.com")
        );
        assert_eq!(resolved.cloud.auth_token.as_deref(), Some("stored"));
        assert_eq!(resolved.user_id, "alice");
        assert_eq!(resolved.cloud.sync_interval, None);
        assert_eq!(resolved.cloud.table_timeout, Duration::from_secs(3));
    }

    #[test]
    fn empty_profile_resolves_to_local_user_without_cloud() {
        let resolved = CliProfile::default().resolve_with(|_| None);
        assert_eq!(resolved.user_id, DEFAULT_USER_ID);
        assert!(!resolved.cloud.is_configured());
    }
}
