//! Error types for flowdeck-core

use thiserror::Error;

use crate::models::Table;

/// Result type alias using flowdeck-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// One table that could not be synchronized during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFailure {
    pub table: Table,
    pub reason: String,
}

impl std::fmt::Display for TableFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.table, self.reason)
    }
}

/// Errors that can occur in flowdeck-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cloud store unreachable, or cloud access requested outside a cloud-enabled mode
    #[error("Offline: {0}")]
    Offline(String),

    /// Unknown database mode
    #[error("Unsupported database mode: {0}")]
    UnsupportedMode(String),

    /// Conflict id does not match an open conflict
    #[error("Unknown conflict: {0}")]
    UnknownConflict(String),

    /// One side of a conflict changed after it was detected; the refreshed
    /// conflict is open again
    #[error("Conflict changed since it was detected: {0}")]
    StaleConflict(String),

    /// Some tables failed during a sync pass; the others completed
    #[error("Sync partially failed: {}", format_failures(.0))]
    PartialSync(Vec<TableFailure>),

    /// Cloud store rejected a request
    #[error("Cloud error: {0}")]
    Cloud(String),

    /// Sync pass cancelled by a mode switch
    #[error("Sync pass cancelled")]
    Cancelled,

    /// Façade used after its mode was switched away
    #[error("Database service is closed")]
    Closed,
}

impl Error {
    /// Whether the caller may retry the same operation later.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Offline(_) | Self::PartialSync(_) | Self::StaleConflict(_) | Self::Cancelled
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::Offline(error.to_string())
        } else {
            Self::Cloud(error.to_string())
        }
    }
}

fn format_failures(failures: &[TableFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
