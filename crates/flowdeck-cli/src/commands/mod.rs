pub mod column;
pub mod common;
pub mod config;
pub mod key;
pub mod message;
pub mod mode;
pub mod reminder;
pub mod sync;
pub mod task;
