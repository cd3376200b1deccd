//! One user turn, end to end.
//!
//! A turn sanitizes the input, records the user message before any network
//! I/O, sends the bounded history to the backend, and feeds the reply back into
//! the store. Every failure ends up as exactly one assistant message with
//! `status = error`; nothing is returned to the caller as an `Err`.

pub mod failure;
pub mod input;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ChatEnvelope, ChatRequest, RateLimitInfo};
use crate::core::chat_stream::{extract_error_summary, ChatTransport, ResponseBody, TransportError};
use crate::core::config::data::Config;
use crate::core::message::{ConversationId, MessageDraft, MessageId, MessagePatch, MessageStatus};
use crate::core::store::{ConversationStore, SharedStore};
use crate::core::stream_decoder::{ByteStream, StreamEvent, StreamReader};

pub use failure::FailureKind;
pub use input::{sanitize_input, MAX_INPUT_CHARS};

/// Title of the conversation a turn creates when none is current.
pub const NEW_CHAT_TITLE: &str = "New Chat";
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnSettings {
    /// How many earlier messages travel with each request.
    pub history_limit: usize,
    pub max_input_chars: usize,
    pub prefer_streaming: bool,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_input_chars: MAX_INPUT_CHARS,
            prefer_streaming: true,
        }
    }
}

impl TurnSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            history_limit: config.history_limit(),
            max_input_chars: config.max_input_chars(),
            prefer_streaming: config.streaming_enabled(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReceipt {
    pub conversation_id: ConversationId,
    pub user_message_id: MessageId,
    /// `None` when the turn was cancelled before any reply arrived.
    pub assistant_message_id: Option<MessageId>,
    pub rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnFailure {
    pub kind: FailureKind,
    /// The underlying error, as reported by the backend or transport.
    pub detail: String,
    pub conversation_id: ConversationId,
    pub user_message_id: MessageId,
    pub error_message_id: MessageId,
    pub rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Input was empty after sanitizing. Nothing was stored or sent.
    Rejected,
    Replied(TurnReceipt),
    Failed(TurnFailure),
    Cancelled(TurnReceipt),
}

impl TurnOutcome {
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            TurnOutcome::Rejected => None,
            TurnOutcome::Replied(receipt) | TurnOutcome::Cancelled(receipt) => {
                Some(&receipt.conversation_id)
            }
            TurnOutcome::Failed(failure) => Some(&failure.conversation_id),
        }
    }

    pub fn rate_limit(&self) -> Option<RateLimitInfo> {
        match self {
            TurnOutcome::Rejected => None,
            TurnOutcome::Replied(receipt) | TurnOutcome::Cancelled(receipt) => receipt.rate_limit,
            TurnOutcome::Failed(failure) => failure.rate_limit,
        }
    }
}

struct TurnError {
    detail: String,
    status: Option<u16>,
}

impl TurnError {
    fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            status: None,
        }
    }

    fn transport(err: TransportError) -> Self {
        Self::new(err.to_string())
    }

    /// A non-2xx answer. The envelope's `error` is preferred over the bare
    /// status line.
    fn status(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| extract_error_summary(&value))
            .unwrap_or_else(|| format!("HTTP error! status: {status}"));
        Self {
            detail,
            status: Some(status),
        }
    }
}

enum TurnEnd {
    Replied,
    Cancelled,
}

/// Per-turn bookkeeping. Stream updates are addressed by the conversation
/// captured here, never by whatever happens to be current later.
struct Turn {
    conversation_id: ConversationId,
    user_message_id: MessageId,
    reply_id: Option<MessageId>,
    rate_limit: Option<RateLimitInfo>,
}

impl Turn {
    fn receipt(self) -> TurnReceipt {
        TurnReceipt {
            conversation_id: self.conversation_id,
            user_message_id: self.user_message_id,
            assistant_message_id: self.reply_id,
            rate_limit: self.rate_limit,
        }
    }

    /// Append to the turn's conversation. When that conversation has been
    /// deleted mid-turn the message lands in the current one instead, created
    /// if needed, and the turn follows it.
    fn append(&mut self, store: &mut ConversationStore, draft: MessageDraft) -> MessageId {
        if let Some(id) = store.add_message_to(&self.conversation_id, draft.clone()) {
            return id;
        }
        debug!(
            conversation_id = %self.conversation_id,
            "conversation removed mid-turn, moving reply to the current one"
        );
        self.conversation_id = store.ensure_current_conversation(NEW_CHAT_TITLE);
        store.add_message(draft)
    }
}

/// Keeps the store's loading flag raised while any turn is in flight.
struct LoadingGuard<'a> {
    store: &'a SharedStore,
    in_flight: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
    fn engage(store: &'a SharedStore, in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        store.with(|store| {
            store.set_error(None);
            store.set_loading(true);
        });
        Self { store, in_flight }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        self.store.with(|store| store.set_loading(remaining > 0));
    }
}

pub struct ChatOrchestrator<T> {
    store: SharedStore,
    transport: T,
    settings: TurnSettings,
    in_flight: AtomicUsize,
}

impl<T: ChatTransport> ChatOrchestrator<T> {
    pub fn new(store: SharedStore, transport: T, settings: TurnSettings) -> Self {
        Self {
            store,
            transport,
            settings,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn settings(&self) -> TurnSettings {
        self.settings
    }

    pub async fn send_message(&self, input: &str) -> TurnOutcome {
        self.send_message_with_cancel(input, CancellationToken::new())
            .await
    }

    /// Run one turn. Cancelling `cancel` stops reading the reply, keeps
    /// whatever text already arrived, and appends no error message.
    pub async fn send_message_with_cancel(
        &self,
        input: &str,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let Some(content) = sanitize_input(input, self.settings.max_input_chars) else {
            debug!("rejecting empty chat input");
            return TurnOutcome::Rejected;
        };

        let _loading = LoadingGuard::engage(&self.store, &self.in_flight);
        let history_limit = self.settings.history_limit;
        let (mut turn, request) = self.store.with(|store| {
            let conversation_id = store.ensure_current_conversation(NEW_CHAT_TITLE);
            let conversation_history = store
                .conversation(&conversation_id)
                .map(|conversation| conversation.recent_messages(history_limit).to_vec())
                .unwrap_or_default();
            let personality = store.config().personality.mode.as_str().to_string();
            let user_message_id = store.add_message(MessageDraft::user(content.clone()));

            let turn = Turn {
                conversation_id,
                user_message_id,
                reply_id: None,
                rate_limit: None,
            };
            let request = ChatRequest {
                message: content,
                conversation_history,
                personality,
            };
            (turn, request)
        });
        debug!(
            conversation_id = %turn.conversation_id,
            history = request.conversation_history.len(),
            "starting chat turn"
        );

        match self.run_turn(&request, &mut turn, &cancel).await {
            Ok(TurnEnd::Replied) => TurnOutcome::Replied(turn.receipt()),
            Ok(TurnEnd::Cancelled) => {
                self.finalize_partial_reply(&turn);
                TurnOutcome::Cancelled(turn.receipt())
            }
            Err(error) => TurnOutcome::Failed(self.record_failure(turn, error)),
        }
    }

    async fn run_turn(
        &self,
        request: &ChatRequest,
        turn: &mut Turn,
        cancel: &CancellationToken,
    ) -> Result<TurnEnd, TurnError> {
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.transport.send_chat(request, self.settings.prefer_streaming) => Some(result),
        };
        let Some(result) = sent else {
            return Ok(TurnEnd::Cancelled);
        };
        let response = result.map_err(TurnError::transport)?;
        turn.rate_limit = response.rate_limit;

        if !response.is_success() {
            let body = match response.body {
                ResponseBody::Text(body) => body,
                ResponseBody::Stream(_) => String::new(),
            };
            return Err(TurnError::status(response.status, &body));
        }

        match response.body {
            ResponseBody::Text(body) => {
                let content = parse_envelope(&body)?;
                let reply_id = self.store.with(|store| {
                    turn.append(store, MessageDraft::assistant(content, MessageStatus::Sent))
                });
                turn.reply_id = Some(reply_id);
                Ok(TurnEnd::Replied)
            }
            ResponseBody::Stream(body) => self.consume_stream(body, turn, cancel).await,
        }
    }

    async fn consume_stream(
        &self,
        body: ByteStream,
        turn: &mut Turn,
        cancel: &CancellationToken,
    ) -> Result<TurnEnd, TurnError> {
        let mut reader = StreamReader::new(body).with_cancellation(cancel.clone());

        while let Some(event) = reader.next_event().await {
            let delta = match event {
                StreamEvent::Content(delta) => delta,
                StreamEvent::Failed { message } => return Err(TurnError::new(message)),
            };
            let status = if delta.is_final {
                MessageStatus::Sent
            } else {
                MessageStatus::Sending
            };

            // The placeholder is created by the first event, never before. If it
            // disappears mid-stream, the reply so far is appended again.
            let reply_id = self.store.with(|store| {
                if let Some(reply_id) = &turn.reply_id {
                    let patch = MessagePatch::replace_content(delta.full_content.clone())
                        .with_status(status);
                    if store.update_message_in(&turn.conversation_id, reply_id, patch) {
                        return reply_id.clone();
                    }
                }
                turn.append(store, MessageDraft::assistant(delta.full_content, status))
            });
            turn.reply_id = Some(reply_id);
        }

        if reader.is_cancelled() {
            Ok(TurnEnd::Cancelled)
        } else {
            Ok(TurnEnd::Replied)
        }
    }

    fn finalize_partial_reply(&self, turn: &Turn) {
        if let Some(reply_id) = &turn.reply_id {
            self.store.with(|store| {
                store.update_message_in(
                    &turn.conversation_id,
                    reply_id,
                    MessagePatch::status(MessageStatus::Sent),
                )
            });
        }
    }

    /// Turn a failure into the single error message of this turn. A streaming
    /// placeholder, when one exists, becomes that message.
    fn record_failure(&self, mut turn: Turn, error: TurnError) -> TurnFailure {
        let kind = FailureKind::classify(&error.detail, error.status);
        warn!(kind = kind.label(), status = ?error.status, "chat turn failed: {}", error.detail);
        let text = kind.remediation(&error.detail, turn.rate_limit);

        let error_message_id = self.store.with(|store| {
            store.set_error(Some(error.detail.clone()));
            let patch = MessagePatch::replace_content(text.clone()).with_status(MessageStatus::Error);
            if let Some(reply_id) = &turn.reply_id {
                if store.update_message_in(&turn.conversation_id, reply_id, patch) {
                    return reply_id.clone();
                }
            }
            turn.append(store, MessageDraft::assistant(text, MessageStatus::Error))
        });

        TurnFailure {
            kind,
            detail: error.detail,
            conversation_id: turn.conversation_id,
            user_message_id: turn.user_message_id,
            error_message_id,
            rate_limit: turn.rate_limit,
        }
    }
}

fn parse_envelope(body: &str) -> Result<String, TurnError> {
    let envelope: ChatEnvelope = serde_json::from_str(body)
        .map_err(|err| TurnError::transport(TransportError::Decode(err)))?;
    match (envelope.success, envelope.data) {
        (true, Some(reply)) => Ok(reply.content),
        _ => Err(TurnError::new(
            envelope
                .error
                .unwrap_or_else(|| "Failed to get AI response".to_string()),
        )),
    }
}
