use chrono::{DateTime, Utc};
use flowdeck_core::models::{Reminder, Task};
use flowdeck_core::Record;

use crate::cli::ReminderCommands;
use crate::commands::common::{
    normalize_title, preview, print_json, resolve_record, short_id, Context,
};
use crate::error::CliError;

pub async fn run_reminder(command: ReminderCommands, ctx: &Context) -> Result<(), CliError> {
    let db = ctx.open().await?;
    match command {
        ReminderCommands::Add { title, at, task } => {
            let mut reminder = Reminder::new(normalize_title(&title)?, parse_remind_at(&at)?);
            if let Some(task) = task {
                reminder.task_id = Some(resolve_record::<Task>(&db, &task).await?.id());
            }
            let created = db.create_reminder(reminder).await?;
            println!("{}", created.id());
        }
        ReminderCommands::List { json } => {
            let mut reminders = db.get_reminders().await?;
            reminders.sort_by_key(|reminder| (reminder.fields.remind_at, reminder.id()));
            if json {
                print_json(&reminders)?;
            } else {
                for line in format_reminder_lines(&reminders) {
                    println!("{line}");
                }
            }
        }
        ReminderCommands::Delete { id } => {
            let reminder = resolve_record::<Reminder>(&db, &id).await?;
            db.delete_reminder(&reminder.id()).await?;
            println!("{}", reminder.id());
        }
    }
    Ok(())
}

pub fn parse_remind_at(value: &str) -> Result<DateTime<Utc>, CliError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|time| time.with_timezone(&Utc))
        .map_err(|error| CliError::InvalidValue(format!("reminder time '{value}': {error}")))
}

pub fn format_reminder_lines(reminders: &[Record<Reminder>]) -> Vec<String> {
    reminders
        .iter()
        .map(|reminder| {
            format!(
                "{:<13}  {}  {}{}",
                short_id(&reminder.id()),
                reminder.fields.remind_at.format("%Y-%m-%d %H:%M UTC"),
                preview(&reminder.fields.title, 40),
                if reminder.fields.completed { "  (done)" } else { "" }
            )
        })
        .collect()
}
