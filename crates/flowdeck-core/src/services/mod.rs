//! Client-facing services

mod database;
mod mode_controller;

pub use database::DatabaseService;
pub use mode_controller::{ControllerConfig, ModeController};
