//! Conversation history export.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, SecondsFormat};
use tempfile::NamedTempFile;

use crate::core::config::data::path_display;
use crate::core::message::Conversation;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Text,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Text => "txt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "txt" | "text" => Ok(ExportFormat::Text),
            other => Err(format!("Unknown export format '{other}'. Use json or txt.")),
        }
    }
}

#[derive(Debug)]
pub enum ExportError {
    Encode(serde_json::Error),
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Encode(source) => write!(f, "Failed to encode export: {source}"),
            ExportError::Write { path, source } => {
                write!(f, "Failed to write export to {}: {}", path_display(path), source)
            }
        }
    }
}

impl StdError for ExportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ExportError::Encode(source) => Some(source),
            ExportError::Write { source, .. } => Some(source),
        }
    }
}

/// `chat-history-YYYY-MM-DD.<ext>`
pub fn default_export_file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!("chat-history-{}.{}", date.format("%Y-%m-%d"), format.extension())
}

pub fn render_export(
    conversations: &[Conversation],
    format: ExportFormat,
) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => {
            serde_json::to_string_pretty(conversations).map_err(ExportError::Encode)
        }
        ExportFormat::Text => Ok(conversations.iter().map(render_text_block).collect()),
    }
}

fn render_text_block(conversation: &Conversation) -> String {
    let lines: Vec<String> = conversation
        .messages
        .iter()
        .map(|message| {
            format!(
                "[{}] {}",
                message.sender.as_str().to_uppercase(),
                message.content
            )
        })
        .collect();
    format!(
        "Conversation: {}\nDate: {}\n\n{}\n\n---\n\n",
        conversation.title,
        conversation
            .created_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        lines.join("\n")
    )
}

/// Render and atomically write an export to `path`.
pub fn write_export(
    path: &Path,
    conversations: &[Conversation],
    format: ExportFormat,
) -> Result<(), ExportError> {
    let contents = render_export(conversations, format)?;
    let write_err = |source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(write_err)?;
    }
    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new_in("."),
    }
    .map_err(write_err)?;
    temp_file.write_all(contents.as_bytes()).map_err(write_err)?;
    temp_file.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{Message, MessageStatus, Sender};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample() -> Vec<Conversation> {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let mut conversation = Conversation::new("c1".into(), "Chai talk", created);
        conversation.messages = vec![
            Message {
                id: "m1".into(),
                content: "Hello".into(),
                sender: Sender::User,
                status: MessageStatus::Sent,
                timestamp: created,
            },
            Message {
                id: "m2".into(),
                content: "Hi! Kaise ho?".into(),
                sender: Sender::Assistant,
                status: MessageStatus::Sent,
                timestamp: created,
            },
        ];
        vec![conversation]
    }

    #[test]
    fn text_export_lists_messages_by_sender() {
        let text = render_export(&sample(), ExportFormat::Text).expect("render");
        assert_eq!(
            text,
            "Conversation: Chai talk\nDate: 2024-03-01T09:30:00.000Z\n\n[USER] Hello\n[AI] Hi! Kaise ho?\n\n---\n\n"
        );
    }

    #[test]
    fn json_export_is_a_pretty_array() {
        let json = render_export(&sample(), ExportFormat::Json).expect("render");
        assert!(json.starts_with("[\n  {"));
        let parsed: Vec<Conversation> = serde_json::from_str(&json).expect("parse back");
        assert_eq!(parsed, sample());
    }

    #[test]
    fn file_name_carries_date_and_extension() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date");
        assert_eq!(
            default_export_file_name(ExportFormat::Json, date),
            "chat-history-2024-03-01.json"
        );
        assert_eq!(
            default_export_file_name(ExportFormat::Text, date),
            "chat-history-2024-03-01.txt"
        );
    }

    #[test]
    fn format_parses_common_spellings() {
        assert_eq!("JSON".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("text".parse::<ExportFormat>(), Ok(ExportFormat::Text));
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn write_export_creates_the_file() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("out").join("history.txt");
        write_export(&path, &sample(), ExportFormat::Text).expect("write");
        let written = fs::read_to_string(&path).expect("read");
        assert!(written.starts_with("Conversation: Chai talk"));
    }
}
