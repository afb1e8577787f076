use flowdeck_core::models::{Column, Priority, Task, TaskStatus};
use flowdeck_core::services::DatabaseService;
use flowdeck_core::{Record, SyncStatus};

use crate::cli::TaskCommands;
use crate::commands::common::{
    normalize_title, preview, print_json, resolve_record, short_id, stamp_relative, Context,
};
use crate::error::CliError;

pub async fn run_task(command: TaskCommands, ctx: &Context) -> Result<(), CliError> {
    let db = ctx.open().await?;
    match command {
        TaskCommands::Add {
            title,
            column,
            priority,
            tags,
        } => {
            let mut task = Task::new(normalize_title(&title)?).with_tags(tags);
            if let Some(priority) = priority {
                task.priority = priority.into();
            }
            if let Some(column) = column {
                let column = resolve_record::<Column>(&db, &column).await?;
                task.position = next_position(&db, &column).await?;
                task = task.in_column(column.id());
            }
            let created = db.create_task(task).await?;
            println!("{}", created.id());
        }
        TaskCommands::List { status, json } => {
            let tasks = list_tasks(&db, status.map(Into::into)).await?;
            if json {
                print_json(&tasks)?;
            } else {
                for line in format_task_lines(&tasks) {
                    println!("{line}");
                }
            }
        }
        TaskCommands::Edit {
            id,
            title,
            description,
            status,
            priority,
        } => {
            let record = resolve_record::<Task>(&db, &id).await?;
            let mut task = record.fields.clone();
            if let Some(title) = title {
                task.title = normalize_title(&[title])?;
            }
            if let Some(description) = description {
                task.description = description.trim().to_string();
            }
            if let Some(status) = status {
                task.status = status.into();
            }
            if let Some(priority) = priority {
                task.priority = priority.into();
            }
            if task != record.fields {
                db.update_task(&record.id(), task).await?;
            }
            println!("{}", record.id());
        }
        TaskCommands::Move {
            id,
            column,
            position,
        } => {
            let record = resolve_record::<Task>(&db, &id).await?;
            let column = resolve_record::<Column>(&db, &column).await?;
            let mut task = record.fields.clone();
            task.position = match position {
                Some(position) => position,
                None => next_position(&db, &column).await?,
            };
            task.column_id = Some(column.id());
            db.update_task(&record.id(), task).await?;
            println!("{}", record.id());
        }
        TaskCommands::Delete { id } => {
            let record = resolve_record::<Task>(&db, &id).await?;
            db.delete_task(&record.id()).await?;
            println!("{}", record.id());
        }
    }
    Ok(())
}

pub async fn list_tasks(
    db: &DatabaseService,
    status: Option<TaskStatus>,
) -> Result<Vec<Record<Task>>, CliError> {
    let mut tasks = db.get_tasks().await?;
    if let Some(status) = status {
        tasks.retain(|task| task.fields.status == status);
    }
    tasks.sort_by_key(|task| (task.fields.column_id, task.fields.position, task.id()));
    Ok(tasks)
}

async fn next_position(db: &DatabaseService, column: &Record<Column>) -> Result<i64, CliError> {
    let tasks = db.get_tasks().await?;
    Ok(tasks
        .iter()
        .filter(|task| task.fields.column_id == Some(column.id()))
        .map(|task| task.fields.position + 1)
        .max()
        .unwrap_or(0))
}

pub const fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "todo",
        TaskStatus::InProgress => "in progress",
        TaskStatus::Done => "done",
    }
}

pub const fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
    }
}

pub fn format_task_lines(tasks: &[Record<Task>]) -> Vec<String> {
    tasks
        .iter()
        .map(|task| {
            let mut line = format!(
                "{:<13}  {:<11}  {:<6}  {:<40}  {}",
                short_id(&task.id()),
                status_label(task.fields.status),
                priority_label(task.fields.priority),
                preview(&task.fields.title, 40),
                stamp_relative(task.envelope.updated_at),
            );
            if task.sync_status() != SyncStatus::Synced {
                line.push_str(&format!("  [{}]", task.sync_status()));
            }
            line
        })
        .collect()
}
