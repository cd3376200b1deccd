//! Incremental rendering of a conversation to a line-oriented terminal.
//!
//! The store is re-read after every revision; the printer remembers what it
//! already wrote so each render only returns the new text. Replies that grow
//! while streaming are written as suffixes of what was printed before.

use std::collections::HashSet;

use crate::core::message::{Conversation, Message, MessageId, MessageStatus};
use crate::utils::time::format_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptOptions {
    /// Prefix replies with `ai>` (and the time when `timestamps` is set).
    pub labels: bool,
    pub timestamps: bool,
    /// Render error messages. When off they are left for the caller to report.
    pub show_errors: bool,
}

pub struct TranscriptPrinter {
    options: TranscriptOptions,
    seen: HashSet<MessageId>,
    partial: Option<(MessageId, String)>,
}

impl TranscriptPrinter {
    pub fn new(options: TranscriptOptions) -> Self {
        Self {
            options,
            seen: HashSet::new(),
            partial: None,
        }
    }

    /// Treat everything already in `conversation` as printed.
    pub fn mark_seen(&mut self, conversation: &Conversation) {
        self.seen
            .extend(conversation.messages.iter().map(|message| message.id.clone()));
    }

    /// Text to write for whatever changed since the last call.
    pub fn render(&mut self, conversation: &Conversation) -> String {
        let mut out = String::new();
        for message in &conversation.messages {
            if self.seen.contains(&message.id) {
                continue;
            }
            if message.is_user() || (message.is_error() && !self.options.show_errors) {
                self.seen.insert(message.id.clone());
                continue;
            }
            self.render_reply(message, &mut out);
        }
        out
    }

    fn render_reply(&mut self, message: &Message, out: &mut String) {
        let printed = match self.partial.take() {
            Some((id, text)) if id == message.id => text,
            Some((_, text)) => {
                // Another reply was left unfinished; close its line.
                if !text.is_empty() {
                    out.push('\n');
                }
                String::new()
            }
            None => String::new(),
        };

        if printed.is_empty() && (!message.content.is_empty() || !message.is_streaming()) {
            out.push_str(&self.label(message));
        }
        match message.content.strip_prefix(printed.as_str()) {
            Some(suffix) => out.push_str(suffix),
            None => {
                // The server corrected earlier text; start the reply over.
                out.push('\n');
                out.push_str(&self.label(message));
                out.push_str(&message.content);
            }
        }

        if message.is_streaming() {
            self.partial = Some((message.id.clone(), message.content.clone()));
        } else {
            out.push('\n');
            self.seen.insert(message.id.clone());
        }
    }

    fn label(&self, message: &Message) -> String {
        let mut label = String::new();
        if message.status == MessageStatus::Error {
            label.push_str("⚠️  ");
        }
        if self.options.labels {
            if self.options.timestamps {
                label.push_str(&format!(
                    "[{}] ",
                    format_timestamp(&message.timestamp.with_timezone(&chrono::Local))
                ));
            }
            label.push_str("ai> ");
        }
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Sender;
    use chrono::Utc;

    const PLAIN: TranscriptOptions = TranscriptOptions {
        labels: false,
        timestamps: false,
        show_errors: true,
    };

    fn message(id: &str, sender: Sender, status: MessageStatus, content: &str) -> Message {
        Message {
            id: id.to_string(),
            content: content.to_string(),
            sender,
            status,
            timestamp: Utc::now(),
        }
    }

    fn conversation(messages: Vec<Message>) -> Conversation {
        let mut conversation = Conversation::new("c1".into(), "Test", Utc::now());
        conversation.messages = messages;
        conversation
    }

    #[test]
    fn streaming_reply_is_written_as_suffixes() {
        let mut printer = TranscriptPrinter::new(PLAIN);
        let user = message("u1", Sender::User, MessageStatus::Sent, "hi");

        let step = |content: &str, status| {
            conversation(vec![
                user.clone(),
                message("a1", Sender::Assistant, status, content),
            ])
        };

        assert_eq!(printer.render(&step("Nam", MessageStatus::Sending)), "Nam");
        assert_eq!(printer.render(&step("Namaste", MessageStatus::Sending)), "aste");
        assert_eq!(printer.render(&step("Namaste!", MessageStatus::Sent)), "!\n");
        assert_eq!(printer.render(&step("Namaste!", MessageStatus::Sent)), "");
    }

    #[test]
    fn existing_messages_are_skipped() {
        let mut printer = TranscriptPrinter::new(PLAIN);
        let earlier = conversation(vec![message(
            "a0",
            Sender::Assistant,
            MessageStatus::Sent,
            "old reply",
        )]);
        printer.mark_seen(&earlier);
        assert_eq!(printer.render(&earlier), "");
    }

    #[test]
    fn corrected_text_restarts_the_reply() {
        let mut printer = TranscriptPrinter::new(PLAIN);
        printer.render(&conversation(vec![message(
            "a1",
            Sender::Assistant,
            MessageStatus::Sending,
            "Helo",
        )]));
        let out = printer.render(&conversation(vec![message(
            "a1",
            Sender::Assistant,
            MessageStatus::Sent,
            "Hello",
        )]));
        assert_eq!(out, "\nHello\n");
    }

    #[test]
    fn errors_follow_the_show_errors_option() {
        let failed = conversation(vec![message(
            "e1",
            Sender::Assistant,
            MessageStatus::Error,
            "Something went wrong",
        )]);

        let mut shown = TranscriptPrinter::new(PLAIN);
        assert_eq!(shown.render(&failed), "⚠️  Something went wrong\n");

        let mut hidden = TranscriptPrinter::new(TranscriptOptions {
            show_errors: false,
            ..PLAIN
        });
        assert_eq!(hidden.render(&failed), "");
    }

    #[test]
    fn labels_prefix_each_reply_once() {
        let mut printer = TranscriptPrinter::new(TranscriptOptions {
            labels: true,
            ..PLAIN
        });
        assert_eq!(
            printer.render(&conversation(vec![message(
                "a1",
                Sender::Assistant,
                MessageStatus::Sending,
                "Hi",
            )])),
            "ai> Hi"
        );
        assert_eq!(
            printer.render(&conversation(vec![message(
                "a1",
                Sender::Assistant,
                MessageStatus::Sent,
                "Hi there",
            )])),
            " there\n"
        );
    }
}
