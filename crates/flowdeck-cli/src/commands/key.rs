use flowdeck_core::models::ApiKey;
use flowdeck_core::Record;

use crate::cli::KeyCommands;
use crate::commands::common::{normalize_identifier, print_json, resolve_record, short_id, Context};
use crate::error::CliError;

pub async fn run_key(command: KeyCommands, ctx: &Context) -> Result<(), CliError> {
    let db = ctx.open().await?;
    match command {
        KeyCommands::Add {
            provider,
            key,
            label,
        } => {
            let provider = normalize_identifier(&provider)?;
            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::InvalidValue("API key must not be empty".to_string()));
            }
            let created = db
                .create_api_key(ApiKey::new(provider, label.trim(), key))
                .await?;
            println!("{}", created.id());
        }
        KeyCommands::List { json } => {
            let keys = masked(db.get_api_keys().await?);
            if json {
                print_json(&keys)?;
            } else {
                for line in format_key_lines(&keys) {
                    println!("{line}");
                }
            }
        }
        KeyCommands::Delete { id } => {
            let key = resolve_record::<ApiKey>(&db, &id).await?;
            db.delete_api_key(&key.id()).await?;
            println!("{}", key.id());
        }
    }
    Ok(())
}

/// Replace key material before anything is printed.
pub fn masked(mut keys: Vec<Record<ApiKey>>) -> Vec<Record<ApiKey>> {
    for key in &mut keys {
        key.fields.key = key.fields.masked_key();
    }
    keys
}

pub fn format_key_lines(keys: &[Record<ApiKey>]) -> Vec<String> {
    keys.iter()
        .map(|key| {
            format!(
                "{:<13}  {:<12}  {:<12}  {}",
                short_id(&key.id()),
                key.fields.provider,
                key.fields.label,
                key.fields.key
            )
        })
        .collect()
}
