//! Conversation store: the single source of truth the front-end renders from.
//!
//! All mutation goes through the methods on [`ConversationStore`], which apply
//! a [`reducer`] transition and then write a snapshot through the injected
//! [`Persistence`] port. Ephemeral flags (loading, transient error, voice
//! mode, hydration) live on the store but are never part of the snapshot.

pub mod reducer;
pub mod snapshot;


use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::warn;

use crate::core::message::{
    Conversation, ConversationId, MessageDraft, MessageId, MessagePatch,
};
use crate::core::settings::{ChatConfig, Theme};
use crate::utils::ids::generate_id;

pub use snapshot::{
    JsonFileStorage, MemoryStorage, PersistError, Persistence, AUTH_STORE_KEY, CHAT_STORE_KEY,
};

pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// The persisted portion of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    /// Most recently created first.
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub current_conversation_id: Option<ConversationId>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub config: ChatConfig,
}

pub struct ConversationStore {
    state: ChatState,
    is_loading: bool,
    error: Option<String>,
    is_voice_mode: bool,
    has_hydrated: bool,
    persistence: Option<Box<dyn Persistence<ChatState>>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// An empty store with no persistence attached.
    pub fn new() -> Self {
        Self {
            state: ChatState::default(),
            is_loading: false,
            error: None,
            is_voice_mode: false,
            has_hydrated: false,
            persistence: None,
        }
    }

    /// Initialize from whatever `persistence` holds and mark the store
    /// hydrated. An unreadable snapshot is logged and replaced by an empty state.
    pub fn open(persistence: impl Persistence<ChatState> + 'static) -> Self {
        let state = match persistence.load() {
            Ok(Some(mut state)) => {
                reducer::repair_current(&mut state);
                state
            }
            Ok(None) => ChatState::default(),
            Err(err) => {
                warn!("discarding unreadable chat snapshot: {err}");
                ChatState::default()
            }
        };

        Self {
            state,
            has_hydrated: true,
            persistence: Some(Box::new(persistence)),
            ..Self::new()
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Clone of the persisted portion, as it would be written.
    pub fn snapshot(&self) -> ChatState {
        self.state.clone()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.state.conversations
    }

    pub fn conversation(&self, conversation_id: &str) -> Option<&Conversation> {
        self.state
            .conversations
            .iter()
            .find(|conversation| conversation.id == conversation_id)
    }

    pub fn current_conversation_id(&self) -> Option<&str> {
        self.state.current_conversation_id.as_deref()
    }

    pub fn get_current(&self) -> Option<&Conversation> {
        self.current_conversation_id()
            .and_then(|id| self.conversation(id))
    }

    pub fn export_conversations(&self) -> Vec<Conversation> {
        self.state.conversations.clone()
    }

    pub fn create_conversation(&mut self, title: Option<&str>) -> ConversationId {
        let id = generate_id();
        reducer::create_conversation(
            &mut self.state,
            id.clone(),
            title.unwrap_or(DEFAULT_CONVERSATION_TITLE),
            Utc::now(),
        );
        self.persist();
        id
    }

    /// Return the current conversation id, creating a conversation titled
    /// `title` first when there is none.
    pub fn ensure_current_conversation(&mut self, title: &str) -> ConversationId {
        match self.get_current() {
            Some(conversation) => conversation.id.clone(),
            None => self.create_conversation(Some(title)),
        }
    }

    /// Append to the current conversation, creating one when none exists, so
    /// a message is never dropped for lack of a container.
    pub fn add_message(&mut self, draft: MessageDraft) -> MessageId {
        let conversation_id = self.ensure_current_conversation(DEFAULT_CONVERSATION_TITLE);
        let fresh_id = generate_id();
        // The target was just ensured, so the reducer always appends.
        let id = reducer::add_message(
            &mut self.state,
            &conversation_id,
            draft,
            fresh_id.clone(),
            Utc::now(),
        )
        .unwrap_or(fresh_id);
        self.persist();
        id
    }

    /// Append to an explicit conversation. `None` when it does not exist.
    pub fn add_message_to(
        &mut self,
        conversation_id: &str,
        draft: MessageDraft,
    ) -> Option<MessageId> {
        let id = reducer::add_message(
            &mut self.state,
            conversation_id,
            draft,
            generate_id(),
            Utc::now(),
        )?;
        self.persist();
        Some(id)
    }

    /// Merge `patch` into a message of the current conversation. Unknown ids
    /// are ignored.
    pub fn update_message(&mut self, message_id: &str, patch: MessagePatch) {
        if let Some(conversation_id) = self.state.current_conversation_id.clone() {
            self.update_message_in(&conversation_id, message_id, patch);
        }
    }

    pub fn update_message_in(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        patch: MessagePatch,
    ) -> bool {
        let applied = reducer::update_message(
            &mut self.state,
            conversation_id,
            message_id,
            patch,
            Utc::now(),
        );
        if applied {
            self.persist();
        }
        applied
    }

    pub fn delete_message(&mut self, message_id: &str) {
        let Some(conversation_id) = self.state.current_conversation_id.clone() else {
            return;
        };
        if reducer::delete_message(&mut self.state, &conversation_id, message_id, Utc::now()) {
            self.persist();
        }
    }

    pub fn delete_conversation(&mut self, conversation_id: &str) {
        if reducer::delete_conversation(&mut self.state, conversation_id) {
            self.persist();
        }
    }

    pub fn clear_all(&mut self) {
        reducer::clear_all(&mut self.state);
        self.persist();
    }

    pub fn set_current_conversation(&mut self, conversation_id: Option<&str>) -> bool {
        let applied = reducer::set_current(&mut self.state, conversation_id);
        if applied {
            self.persist();
        }
        applied
    }

    pub fn rename_conversation(&mut self, conversation_id: &str, title: &str) -> bool {
        let applied =
            reducer::rename_conversation(&mut self.state, conversation_id, title, Utc::now());
        if applied {
            self.persist();
        }
        applied
    }

    pub fn theme(&self) -> Theme {
        self.state.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.state.theme = theme;
        self.persist();
    }

    pub fn config(&self) -> &ChatConfig {
        &self.state.config
    }

    pub fn update_config(&mut self, update: impl FnOnce(&mut ChatConfig)) {
        update(&mut self.state.config);
        self.persist();
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn is_voice_mode(&self) -> bool {
        self.is_voice_mode
    }

    pub fn set_voice_mode(&mut self, enabled: bool) {
        self.is_voice_mode = enabled;
    }

    pub fn has_hydrated(&self) -> bool {
        self.has_hydrated
    }

    fn persist(&self) {
        if let Some(persistence) = &self.persistence {
            if let Err(err) = persistence.save(&self.state) {
                warn!("failed to persist chat snapshot: {err}");
            }
        }
    }
}

/// Cloneable handle to a store shared between the front-end and in-flight
/// turns. Every write bumps a revision that renderers can wait on.
///
/// The lock is only ever held for the duration of one synchronous closure,
/// never across an await point.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<ConversationStore>>,
    revision: Arc<watch::Sender<u64>>,
}

impl SharedStore {
    pub fn new(store: ConversationStore) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(store)),
            revision: Arc::new(revision),
        }
    }

    /// Run a mutation and notify subscribers.
    pub fn with<R>(&self, mutate: impl FnOnce(&mut ConversationStore) -> R) -> R {
        let result = {
            let mut store = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            mutate(&mut store)
        };
        self.revision.send_modify(|revision| *revision += 1);
        result
    }

    pub fn read<R>(&self, inspect: impl FnOnce(&ConversationStore) -> R) -> R {
        let store = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inspect(&store)
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
