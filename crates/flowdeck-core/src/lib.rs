//! flowdeck-core - Core library for flowdeck
//!
//! This crate contains the shared models, the local libSQL store, the cloud
//! stores and the sync engine that keeps them consistent. Front ends talk to
//! a [`DatabaseService`] obtained from a [`ModeController`].

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use config::CloudConfig;
pub use error::{Error, Result, TableFailure};
pub use models::{DatabaseMode, Record, RecordId, Resolution, SyncConflict, SyncStatus, Table};
pub use services::{ControllerConfig, DatabaseService, ModeController};
pub use state::SyncPhase;
pub use sync::{MergeWarning, Reconciled, SyncOutcome, SyncReport};
