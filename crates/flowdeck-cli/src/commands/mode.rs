use flowdeck_core::{DatabaseMode, Error, SyncOutcome};

use crate::cli::ModeCommands;
use crate::commands::common::Context;
use crate::commands::sync::print_report;
use crate::error::CliError;

pub async fn run_mode(command: Option<ModeCommands>, ctx: &Context) -> Result<(), CliError> {
    match command.unwrap_or(ModeCommands::Show) {
        ModeCommands::Show => {
            let controller = ctx.controller().await?;
            println!("{}", controller.mode());
            Ok(())
        }
        ModeCommands::Set { mode } => run_mode_set(&mode, ctx).await,
    }
}

async fn run_mode_set(mode: &str, ctx: &Context) -> Result<(), CliError> {
    let controller = ctx.controller().await?;
    let requested: DatabaseMode = mode.parse()?;
    if requested.uses_cloud() && !ctx.resolved_profile()?.cloud.is_configured() {
        return Err(CliError::CloudNotConfigured);
    }

    let facade = controller.set_mode(mode).await?;
    println!("Mode set to {}", facade.mode());

    if facade.mode() != DatabaseMode::Sync {
        return Ok(());
    }

    // The switch already started a pass; wait for it before the process exits.
    match facade.sync().await {
        Ok(SyncOutcome::Completed(report)) => print_report(&report),
        Ok(SyncOutcome::Coalesced) => {
            if let Some(mut phases) = facade.subscribe() {
                let _ = phases.wait_for(|phase| !phase.is_active()).await;
            }
            println!("Initial sync finished");
        }
        Err(Error::Offline(reason)) => {
            eprintln!("Initial sync skipped, cloud unreachable: {reason}");
        }
        Err(error) => return Err(error.into()),
    }
    Ok(())
}
