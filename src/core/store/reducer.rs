//! Pure state transitions over [`ChatState`].
//!
//! Every function here is total: unknown ids are reported through the return
//! value and never panic. Ids and timestamps are supplied by the caller so the
//! transitions stay deterministic.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::ChatState;
use crate::core::message::{
    ContentUpdate, Conversation, ConversationId, Message, MessageDraft, MessageId, MessagePatch,
    MessageStatus, Sender,
};

/// Prepend a new empty conversation and make it current.
pub fn create_conversation(
    state: &mut ChatState,
    id: ConversationId,
    title: &str,
    now: DateTime<Utc>,
) {
    state
        .conversations
        .insert(0, Conversation::new(id.clone(), title, now));
    state.current_conversation_id = Some(id);
}

/// Append a message built from `draft` to the given conversation.
///
/// `fresh_id` is used when the draft carries no id or when its id already
/// exists in the conversation. Returns the id the message was stored under,
/// or `None` when the conversation does not exist.
pub fn add_message(
    state: &mut ChatState,
    conversation_id: &str,
    draft: MessageDraft,
    fresh_id: MessageId,
    now: DateTime<Utc>,
) -> Option<MessageId> {
    let conversation = find_conversation_mut(state, conversation_id)?;

    let id = match draft.id {
        Some(id) if !conversation.contains_message(&id) => id,
        Some(duplicate) => {
            debug!(message_id = %duplicate, "duplicate message id supplied, assigning a new one");
            fresh_id
        }
        None => fresh_id,
    };

    let status = if draft.sender == Sender::User && draft.status == MessageStatus::Sending {
        MessageStatus::Sent
    } else {
        draft.status
    };

    conversation.messages.push(Message {
        id: id.clone(),
        content: draft.content,
        sender: draft.sender,
        status,
        timestamp: now,
    });
    conversation.updated_at = now;
    Some(id)
}

/// Merge `patch` into a message. Returns `false` when either id is unknown.
///
/// Content is frozen once a message reaches `sent`, and user messages never
/// move back to `sending`.
pub fn update_message(
    state: &mut ChatState,
    conversation_id: &str,
    message_id: &str,
    patch: MessagePatch,
    now: DateTime<Utc>,
) -> bool {
    let Some(conversation) = find_conversation_mut(state, conversation_id) else {
        return false;
    };
    let Some(message) = conversation
        .messages
        .iter_mut()
        .find(|message| message.id == message_id)
    else {
        return false;
    };

    if let Some(update) = patch.content {
        if message.status == MessageStatus::Sent {
            debug!(message_id, "ignoring content update for a finalized message");
        } else {
            match update {
                ContentUpdate::Replace(content) => message.content = content,
                ContentUpdate::Append(content) => message.content.push_str(&content),
            }
        }
    }

    if let Some(status) = patch.status {
        if !(message.is_user() && status == MessageStatus::Sending) {
            message.status = status;
        }
    }

    conversation.updated_at = now;
    true
}

pub fn delete_message(
    state: &mut ChatState,
    conversation_id: &str,
    message_id: &str,
    now: DateTime<Utc>,
) -> bool {
    let Some(conversation) = find_conversation_mut(state, conversation_id) else {
        return false;
    };
    let before = conversation.messages.len();
    conversation.messages.retain(|message| message.id != message_id);
    let removed = conversation.messages.len() != before;
    if removed {
        conversation.updated_at = now;
    }
    removed
}

/// Remove a conversation. When it was current, the first remaining
/// conversation becomes current, or none when the set is empty.
pub fn delete_conversation(state: &mut ChatState, conversation_id: &str) -> bool {
    let before = state.conversations.len();
    state
        .conversations
        .retain(|conversation| conversation.id != conversation_id);
    if state.conversations.len() == before {
        return false;
    }

    if state.current_conversation_id.as_deref() == Some(conversation_id) {
        state.current_conversation_id = state
            .conversations
            .first()
            .map(|conversation| conversation.id.clone());
    }
    true
}

pub fn clear_all(state: &mut ChatState) {
    state.conversations.clear();
    state.current_conversation_id = None;
}

/// Point the current reference at an existing conversation, or at nothing.
pub fn set_current(state: &mut ChatState, conversation_id: Option<&str>) -> bool {
    match conversation_id {
        None => {
            state.current_conversation_id = None;
            true
        }
        Some(id) if state.conversations.iter().any(|c| c.id == id) => {
            state.current_conversation_id = Some(id.to_string());
            true
        }
        Some(_) => false,
    }
}

pub fn rename_conversation(
    state: &mut ChatState,
    conversation_id: &str,
    title: &str,
    now: DateTime<Utc>,
) -> bool {
    match find_conversation_mut(state, conversation_id) {
        Some(conversation) => {
            conversation.title = title.to_string();
            conversation.updated_at = now;
            true
        }
        None => false,
    }
}

/// Drop a dangling current reference left behind by an older snapshot.
pub fn repair_current(state: &mut ChatState) {
    if let Some(current) = state.current_conversation_id.as_deref() {
        if !state.conversations.iter().any(|c| c.id == current) {
            debug!(conversation_id = current, "dropping dangling current conversation");
            state.current_conversation_id = None;
        }
    }
}

fn find_conversation_mut<'a>(
    state: &'a mut ChatState,
    conversation_id: &str,
) -> Option<&'a mut Conversation> {
    state
        .conversations
        .iter_mut()
        .find(|conversation| conversation.id == conversation_id)
}
