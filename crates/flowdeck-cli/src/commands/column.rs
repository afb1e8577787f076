use flowdeck_core::models::Column;
use flowdeck_core::Record;

use crate::cli::ColumnCommands;
use crate::commands::common::{normalize_title, print_json, resolve_record, short_id, Context};
use crate::error::CliError;

pub async fn run_column(command: ColumnCommands, ctx: &Context) -> Result<(), CliError> {
    let db = ctx.open().await?;
    match command {
        ColumnCommands::Add { title, position } => {
            let position = match position {
                Some(position) => position,
                None => db
                    .get_columns()
                    .await?
                    .iter()
                    .map(|column| column.fields.position + 1)
                    .max()
                    .unwrap_or(0),
            };
            let created = db
                .create_column(Column::new(normalize_title(&title)?, position))
                .await?;
            println!("{}", created.id());
        }
        ColumnCommands::List { json } => {
            let mut columns = db.get_columns().await?;
            columns.sort_by_key(|column| (column.fields.position, column.id()));
            if json {
                print_json(&columns)?;
            } else {
                for line in format_column_lines(&columns) {
                    println!("{line}");
                }
            }
        }
        ColumnCommands::Delete { id } => {
            let column = resolve_record::<Column>(&db, &id).await?;
            db.delete_column(&column.id()).await?;
            println!("{}", column.id());
        }
    }
    Ok(())
}

pub fn format_column_lines(columns: &[Record<Column>]) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            format!(
                "{:<13}  {:>3}  {}",
                short_id(&column.id()),
                column.fields.position,
                column.fields.title
            )
        })
        .collect()
}
