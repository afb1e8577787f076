//! Data models for flowdeck

mod api_key;
mod column;
mod entity;
mod message;
mod mode;
mod record;
mod reminder;
mod settings;
mod sync_conflict;
mod table;
mod task;

pub use api_key::ApiKey;
pub use column::Column;
pub use entity::{Entity, Record};
pub use message::{Message, MessageRole};
pub use mode::{DatabaseConfig, DatabaseMode};
pub use record::{RecordBody, RecordId, Stamp, SyncEnvelope, SyncRecord, SyncStatus};
pub use reminder::Reminder;
pub use settings::Settings;
pub use sync_conflict::{ConflictType, Resolution, SyncConflict};
pub use table::Table;
pub use task::{Priority, Task, TaskStatus};
