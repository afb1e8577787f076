use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] flowdeck_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Title cannot be empty")]
    EmptyTitle,
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("No {0} found for id/prefix: {1}")]
    RecordNotFound(&'static str, String),
    #[error("{0}")]
    AmbiguousRecordId(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Cloud is not configured. Run `flowdeck config init --cloud-url <URL> --cloud-token <TOKEN>`, or set FLOWDECK_CLOUD_URL and FLOWDECK_CLOUD_TOKEN."
    )]
    CloudNotConfigured,
    #[error("Current mode is {0}; run `flowdeck mode set sync` first")]
    SyncModeRequired(flowdeck_core::DatabaseMode),
}
