use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use flowdeck_core::models::{Entity, Stamp};
use flowdeck_core::services::DatabaseService;
use flowdeck_core::store::{CloudConnector, HttpConnector};
use flowdeck_core::{ControllerConfig, ModeController, Record, RecordId};
use serde::Serialize;

use crate::config_profiles::{CliProfilesConfig, ResolvedProfile};
use crate::error::CliError;

/// Inputs shared by every command
pub struct Context {
    pub db_path: PathBuf,
    pub profile: Option<String>,
}

impl Context {
    pub fn new(db_path: Option<PathBuf>, profile: Option<String>) -> Self {
        Self {
            db_path: resolve_db_path(db_path),
            profile,
        }
    }

    pub fn resolved_profile(&self) -> Result<ResolvedProfile, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        Ok(config.resolve(self.profile.as_deref()))
    }

    pub async fn controller(&self) -> Result<ModeController, CliError> {
        open_controller(&self.db_path, self.resolved_profile()?).await
    }

    /// Façade of the persisted mode.
    pub async fn open(&self) -> Result<Arc<DatabaseService>, CliError> {
        Ok(self.controller().await?.facade())
    }
}

pub async fn open_controller(
    db_path: &Path,
    profile: ResolvedProfile,
) -> Result<ModeController, CliError> {
    let connector: Option<Arc<dyn CloudConnector>> = if profile.cloud.is_configured() {
        Some(Arc::new(HttpConnector::new(profile.cloud.clone())?))
    } else {
        None
    };

    let config = ControllerConfig::new(db_path, profile.user_id).with_cloud(profile.cloud);
    Ok(ModeController::open(config, connector).await?)
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("FLOWDECK_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| panic!("Failed to resolve CLI data directory"))
        .join("flowdeck")
        .join("flowdeck.db")
}

/// Find a live record by full id or unique id prefix.
pub async fn resolve_record<T: Entity>(
    db: &DatabaseService,
    query: &str,
) -> Result<Record<T>, CliError> {
    let query = normalize_identifier(query)?;
    let kind = T::TABLE.as_str();

    if let Ok(id) = query.parse::<RecordId>() {
        if let Some(record) = db.get::<T>(&id).await? {
            return Ok(record);
        }
    }

    let mut matching = db
        .list::<T>()
        .await?
        .into_iter()
        .filter(|record| record.id().to_string().starts_with(&query))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::RecordNotFound(kind, query)),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|record| short_id(&record.id()))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousRecordId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyRecordId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_title(parts: &[String]) -> Result<String, CliError> {
    let title = parts.join(" ");
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        Err(CliError::EmptyTitle)
    } else {
        Ok(collapsed)
    }
}

pub fn short_id(id: &RecordId) -> String {
    id.to_string().chars().take(13).collect()
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn stamp_relative(stamp: Stamp) -> String {
    format_relative_time(
        stamp.wall().timestamp_millis(),
        Utc::now().timestamp_millis(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
