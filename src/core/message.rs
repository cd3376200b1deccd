use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type MessageId = String;
pub type ConversationId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    /// Serialized as `ai`, the name the backend and persisted history use.
    #[serde(rename = "ai", alias = "assistant")]
    Assistant,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "ai",
        }
    }

    pub fn is_user(self) -> bool {
        self == Sender::User
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Assistant message that is still receiving streamed content.
    Sending,
    #[default]
    Sent,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub sender: Sender,
    #[serde(default)]
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn is_user(&self) -> bool {
        self.sender.is_user()
    }

    pub fn is_error(&self) -> bool {
        self.status == MessageStatus::Error
    }

    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Sending
    }
}

/// Everything a caller supplies when appending a message. The store assigns
/// the timestamp and, unless one is supplied for correlation, the id.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub id: Option<MessageId>,
    pub content: String,
    pub sender: Sender,
    pub status: MessageStatus,
}

impl MessageDraft {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            sender: Sender::User,
            status: MessageStatus::Sent,
        }
    }

    pub fn assistant(content: impl Into<String>, status: MessageStatus) -> Self {
        Self {
            id: None,
            content: content.into(),
            sender: Sender::Assistant,
            status,
        }
    }

    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentUpdate {
    Replace(String),
    Append(String),
}

/// Partial update merged into an existing message. Identity fields (`id`,
/// `sender`, `timestamp`) are not representable here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePatch {
    pub content: Option<ContentUpdate>,
    pub status: Option<MessageStatus>,
}

impl MessagePatch {
    pub fn replace_content(content: impl Into<String>) -> Self {
        Self {
            content: Some(ContentUpdate::Replace(content.into())),
            status: None,
        }
    }

    pub fn append_content(content: impl Into<String>) -> Self {
        Self {
            content: Some(ContentUpdate::Append(content.into())),
            status: None,
        }
    }

    pub fn status(status: MessageStatus) -> Self {
        Self {
            content: None,
            status: Some(status),
        }
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn contains_message(&self, id: &str) -> bool {
        self.message(id).is_some()
    }

    /// The trailing `limit` messages in chronological order.
    pub fn recent_messages(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}
