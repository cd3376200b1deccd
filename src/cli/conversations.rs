//! `samvad conversations` and `samvad export`.

use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::Subcommand;

use crate::core::config::data::path_display;
use crate::core::export::{default_export_file_name, write_export, ExportFormat};
use crate::core::message::{Conversation, ConversationId, Sender};
use crate::core::store::{ConversationStore, SharedStore};
use crate::utils::time::{format_date, format_timestamp};

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConversationCommands {
    /// List conversations, newest first (default)
    List,
    /// Print a conversation (the current one by default)
    Show {
        /// List number or id (prefix) of the conversation
        selector: Option<String>,
    },
    /// Make a conversation current
    Switch { selector: String },
    /// Start a new, empty conversation and make it current
    New {
        #[arg(trailing_var_arg = true)]
        title: Vec<String>,
    },
    Rename {
        selector: String,
        #[arg(trailing_var_arg = true, required = true)]
        title: Vec<String>,
    },
    Delete { selector: String },
    /// Delete every conversation
    Clear {
        /// Skip the confirmation warning
        #[arg(long)]
        yes: bool,
    },
}

/// Resolve a 1-based list number or an id prefix to a conversation id.
pub fn resolve_selector(store: &ConversationStore, selector: &str) -> Result<ConversationId, String> {
    let selector = selector.trim();
    let conversations = store.conversations();
    if let Ok(number) = selector.parse::<usize>() {
        return number
            .checked_sub(1)
            .and_then(|index| conversations.get(index))
            .map(|conversation| conversation.id.clone())
            .ok_or_else(|| format!("No conversation numbered {number}"));
    }

    let mut matches = conversations
        .iter()
        .filter(|conversation| conversation.id.starts_with(selector));
    match (matches.next(), matches.next()) {
        (Some(conversation), None) if !selector.is_empty() => Ok(conversation.id.clone()),
        (Some(_), Some(_)) => Err(format!("'{selector}' matches more than one conversation")),
        _ => Err(format!("No conversation matches '{selector}'")),
    }
}

pub fn list_lines(store: &ConversationStore) -> Vec<String> {
    list_lines_on(store, Local::now().date_naive())
}

/// One line per conversation: marker for the current one, number, title,
/// message count, and last activity.
pub fn list_lines_on(store: &ConversationStore, today: NaiveDate) -> Vec<String> {
    let current = store.current_conversation_id();
    store
        .conversations()
        .iter()
        .enumerate()
        .map(|(index, conversation)| {
            let marker = if Some(conversation.id.as_str()) == current {
                '*'
            } else {
                ' '
            };
            let count = conversation.messages.len();
            let noun = if count == 1 { "message" } else { "messages" };
            let updated = conversation.updated_at.with_timezone(&Local).date_naive();
            format!(
                "{marker} {}. {}  ({count} {noun}, {})",
                index + 1,
                conversation.title,
                format_date(updated, today)
            )
        })
        .collect()
}

pub fn render_transcript(conversation: &Conversation, timestamps: bool) -> String {
    let mut out = format!("# {}\n\n", conversation.title);
    for message in &conversation.messages {
        let speaker = match message.sender {
            Sender::User => "you",
            Sender::Assistant => "ai",
        };
        if timestamps {
            let at = message.timestamp.with_timezone(&Local);
            out.push_str(&format!("[{}] ", format_timestamp(&at)));
        }
        let marker = if message.is_error() { "⚠️  " } else { "" };
        out.push_str(&format!("{speaker}> {marker}{}\n", message.content));
    }
    out
}

pub fn run_conversations(
    store: &SharedStore,
    command: Option<ConversationCommands>,
) -> Result<(), Box<dyn Error>> {
    match command.unwrap_or(ConversationCommands::List) {
        ConversationCommands::List => {
            let lines = store.read(list_lines);
            if lines.is_empty() {
                println!("No conversations yet. Run 'samvad' to start one.");
            }
            for line in lines {
                println!("{line}");
            }
        }
        ConversationCommands::Show { selector } => {
            let transcript = store.read(|store| -> Result<String, String> {
                let id = match selector.as_deref() {
                    Some(selector) => resolve_selector(store, selector)?,
                    None => store
                        .current_conversation_id()
                        .map(str::to_string)
                        .ok_or_else(|| "No conversation selected".to_string())?,
                };
                let conversation = store
                    .conversation(&id)
                    .ok_or_else(|| format!("No conversation matches '{id}'"))?;
                Ok(render_transcript(
                    conversation,
                    store.config().show_timestamps,
                ))
            })?;
            print!("{transcript}");
        }
        ConversationCommands::Switch { selector } => {
            let title = store.with(|store| -> Result<String, String> {
                let id = resolve_selector(store, &selector)?;
                store.set_current_conversation(Some(&id));
                Ok(store
                    .get_current()
                    .map(|conversation| conversation.title.clone())
                    .unwrap_or_default())
            })?;
            println!("✅ Switched to \"{title}\"");
        }
        ConversationCommands::New { title } => {
            let title = title.join(" ");
            let title = (!title.trim().is_empty()).then_some(title.trim());
            store.with(|store| store.create_conversation(title));
            println!("✅ Started a new conversation");
        }
        ConversationCommands::Rename { selector, title } => {
            let title = title.join(" ");
            store.with(|store| -> Result<(), String> {
                let id = resolve_selector(store, &selector)?;
                store.rename_conversation(&id, title.trim());
                Ok(())
            })?;
            println!("✅ Renamed to \"{}\"", title.trim());
        }
        ConversationCommands::Delete { selector } => {
            store.with(|store| -> Result<(), String> {
                let id = resolve_selector(store, &selector)?;
                store.delete_conversation(&id);
                Ok(())
            })?;
            println!("✅ Conversation deleted");
        }
        ConversationCommands::Clear { yes } => {
            if !yes {
                eprintln!("⚠️  This deletes every conversation.");
                eprintln!("Run 'samvad conversations clear --yes' to confirm.");
                return Ok(());
            }
            store.with(|store| store.clear_all());
            println!("✅ All conversations deleted");
        }
    }
    Ok(())
}

/// Write every conversation to `output`, or to `chat-history-<date>.<ext>`
/// in the working directory.
pub fn run_export(
    store: &SharedStore,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let conversations = store.read(|store| store.export_conversations());
    let path = output.unwrap_or_else(|| {
        PathBuf::from(default_export_file_name(format, Local::now().date_naive()))
    });
    write_export(&path, &conversations, format)?;
    println!(
        "✅ Exported {} conversation(s) to {}",
        conversations.len(),
        path_display(&path)
    );
    Ok(())
}
