//! Local database layer for flowdeck

mod connection;
mod migrations;
mod repository;
mod settings_repository;

pub use connection::Database;
pub use repository::{RecordRepository, StoredRecord};
pub use settings_repository::{LibSqlSettingsRepository, SettingsRepository};
