use flowdeck_core::models::{Message, MessageRole};
use flowdeck_core::Record;

use crate::cli::MessageCommands;
use crate::commands::common::{
    normalize_identifier, normalize_title, preview, print_json, resolve_record, short_id, Context,
};
use crate::error::CliError;

pub async fn run_message(command: MessageCommands, ctx: &Context) -> Result<(), CliError> {
    let db = ctx.open().await?;
    match command {
        MessageCommands::Add {
            conversation,
            role,
            content,
        } => {
            let conversation = normalize_identifier(&conversation)?;
            let message = Message::new(conversation, role.into(), normalize_title(&content)?);
            let created = db.create_message(message).await?;
            println!("{}", created.id());
        }
        MessageCommands::List { conversation, json } => {
            let mut messages = db.get_messages().await?;
            if let Some(conversation) = conversation {
                messages.retain(|message| message.fields.conversation_id == conversation.trim());
            }
            messages.sort_by_key(Record::id);
            if json {
                print_json(&messages)?;
            } else {
                for line in format_message_lines(&messages) {
                    println!("{line}");
                }
            }
        }
        MessageCommands::Delete { id } => {
            let message = resolve_record::<Message>(&db, &id).await?;
            db.delete_message(&message.id()).await?;
            println!("{}", message.id());
        }
    }
    Ok(())
}

const fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
    }
}

pub fn format_message_lines(messages: &[Record<Message>]) -> Vec<String> {
    messages
        .iter()
        .map(|message| {
            format!(
                "{:<13}  {:<12}  {:<9}  {}",
                short_id(&message.id()),
                preview(&message.fields.conversation_id, 12),
                role_label(message.fields.role),
                preview(&message.fields.content, 60)
            )
        })
        .collect()
}
