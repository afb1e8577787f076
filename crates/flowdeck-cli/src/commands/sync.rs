use std::sync::Arc;

use flowdeck_core::services::DatabaseService;
use flowdeck_core::{DatabaseMode, Resolution, SyncConflict, SyncOutcome, SyncReport};

use crate::cli::SyncCommands;
use crate::commands::common::{normalize_identifier, print_json, short_id, stamp_relative, Context};
use crate::error::CliError;

pub async fn run_sync(command: Option<SyncCommands>, ctx: &Context) -> Result<(), CliError> {
    let db = open_sync_database(ctx).await?;
    match command {
        None => {
            let report = run_pass(&db).await?;
            print_report(&report);
            Ok(report.into_result().map(|_| ())?)
        }
        Some(SyncCommands::Conflicts { json }) => run_sync_conflicts(&db, json).await,
        Some(SyncCommands::Resolve { id, resolution }) => {
            run_sync_resolve(&db, &id, resolution.into()).await
        }
    }
}

async fn open_sync_database(ctx: &Context) -> Result<Arc<DatabaseService>, CliError> {
    let db = ctx.open().await?;
    match db.mode() {
        DatabaseMode::Sync => Ok(db),
        other => Err(CliError::SyncModeRequired(other)),
    }
}

/// One pass; open conflicts are only known after detection has run.
pub async fn run_pass(db: &DatabaseService) -> Result<SyncReport, CliError> {
    match db.sync().await? {
        SyncOutcome::Completed(report) => Ok(report),
        SyncOutcome::Coalesced => Ok(SyncReport::default()),
    }
}

pub async fn run_sync_conflicts(db: &DatabaseService, as_json: bool) -> Result<(), CliError> {
    if let Err(error) = run_pass(db).await {
        tracing::warn!("Conflict list may be incomplete: {error}");
    }
    let conflicts = db.conflicts();

    if as_json {
        return print_json(&conflicts);
    }
    if conflicts.is_empty() {
        println!("No open sync conflicts.");
        return Ok(());
    }
    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_sync_resolve(
    db: &DatabaseService,
    query: &str,
    resolution: Resolution,
) -> Result<(), CliError> {
    let query = normalize_identifier(query)?;
    run_pass(db).await?;

    let conflict = find_conflict(&db.conflicts(), &query)?;
    let reconciled = db.resolve_conflict(&conflict.id, resolution).await?;
    for warning in &reconciled.warnings {
        println!("warning: {warning}");
    }
    println!("{}", conflict.id);
    Ok(())
}

pub fn find_conflict(conflicts: &[SyncConflict], query: &str) -> Result<SyncConflict, CliError> {
    let matching = conflicts
        .iter()
        .filter(|conflict| conflict.id.to_string().starts_with(query))
        .collect::<Vec<_>>();
    match matching.as_slice() {
        [] => Err(CliError::RecordNotFound("conflict", query.to_string())),
        [conflict] => Ok((*conflict).clone()),
        _ => Err(CliError::AmbiguousRecordId(format!(
            "ID prefix '{query}' matches {} conflicts",
            matching.len()
        ))),
    }
}

pub fn format_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{:<13}  {:<9}  {:<28}  local={} cloud={}",
                short_id(&conflict.id),
                conflict.table.as_str(),
                conflict.conflict_type.to_string(),
                stamp_relative(conflict.local_data.envelope.updated_at),
                stamp_relative(conflict.cloud_data.envelope.updated_at),
            )
        })
        .collect()
}

pub fn format_report(report: &SyncReport) -> String {
    let mut line = format!(
        "pushed {}, pulled {}, removed {}, converged {}, conflicts {}",
        report.pushed, report.pulled, report.removed, report.converged, report.conflicts
    );
    if !report.failures.is_empty() {
        let failed = report
            .failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        line.push_str(&format!(", failed: {failed}"));
    }
    line
}

pub fn print_report(report: &SyncReport) {
    println!("Sync completed: {}", format_report(report));
    if report.conflicts > 0 {
        println!("Run `flowdeck sync conflicts` to review open conflicts.");
    }
}
