//! flowdeck CLI - task board, reminders and chat history from the terminal
//!
//! Works fully offline in `local` mode; `sync` mode reconciles with the
//! configured cloud record store.

mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::column::run_column;
use crate::commands::common::Context;
use crate::commands::config::run_config;
use crate::commands::key::run_key;
use crate::commands::message::run_message;
use crate::commands::mode::run_mode;
use crate::commands::reminder::run_reminder;
use crate::commands::sync::run_sync;
use crate::commands::task::run_task;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("flowdeck_core=info,flowdeck_cli=info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::new(cli.db_path, cli.profile);

    match cli.command {
        Commands::Mode { command } => run_mode(command, &ctx).await,
        Commands::Task { command } => run_task(command, &ctx).await,
        Commands::Column { command } => run_column(command, &ctx).await,
        Commands::Reminder { command } => run_reminder(command, &ctx).await,
        Commands::Message { command } => run_message(command, &ctx).await,
        Commands::Key { command } => run_key(command, &ctx).await,
        Commands::Sync { command } => run_sync(command, &ctx).await,
        Commands::Config { command } => run_config(command, &ctx),
    }
}
