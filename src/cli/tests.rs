use super::*;
use crate::api::{ChatEnvelope, ChatRequest};
use crate::cli::conversations::ConversationCommands;
use crate::core::chat_stream::{BackendResponse, ChatTransport, TransportError};
use crate::core::message::MessageStatus;
use async_trait::async_trait;
use std::sync::Mutex;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }

    /// Answers every request with the same whole (non-streamed) response.
    pub(super) struct FixedTransport {
        pub status: u16,
        pub body: String,
        pub seen: Mutex<Vec<ChatRequest>>,
    }

    impl FixedTransport {
        pub fn new(status: u16, body: String) -> Self {
            Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for FixedTransport {
        async fn send_chat(
            &self,
            request: &ChatRequest,
            _stream: bool,
        ) -> Result<BackendResponse, TransportError> {
            self.seen.lock().expect("seen").push(request.clone());
            Ok(BackendResponse::text(self.status, self.body.clone()))
        }
    }
}

use test_helpers::{parse_args, FixedTransport};

#[test]
fn no_subcommand_means_chat() {
    let args = parse_args(&["samvad"]);
    assert!(args.command.is_none());
    assert!(!args.no_stream);
}

#[test]
fn global_flags_parse_after_subcommands() {
    let args = parse_args(&[
        "samvad",
        "say",
        "--no-stream",
        "-b",
        "http://example.test",
        "hello",
    ]);
    assert!(args.no_stream);
    assert_eq!(args.backend.as_deref(), Some("http://example.test"));
    assert_eq!(
        args.command,
        Some(Commands::Say {
            prompt: vec!["hello".to_string()]
        })
    );
}

#[test]
fn say_collects_the_whole_prompt() {
    let args = parse_args(&["samvad", "say", "what", "is", "-1", "squared?"]);
    assert_eq!(
        args.command,
        Some(Commands::Say {
            prompt: ["what", "is", "-1", "squared?"]
                .iter()
                .map(|word| word.to_string())
                .collect()
        })
    );
}

#[test]
fn set_accepts_multi_word_values_and_no_key() {
    let args = parse_args(&["samvad", "set", "data-dir", "My", "Chats"]);
    assert_eq!(
        args.command,
        Some(Commands::Set {
            key: Some("data-dir".to_string()),
            value: vec!["My".to_string(), "Chats".to_string()],
        })
    );

    let args = parse_args(&["samvad", "set"]);
    assert_eq!(
        args.command,
        Some(Commands::Set {
            key: None,
            value: Vec::new(),
        })
    );
}

#[test]
fn export_format_is_validated() {
    let args = parse_args(&["samvad", "export", "--format", "txt", "-o", "out.txt"]);
    assert_eq!(
        args.command,
        Some(Commands::Export {
            format: ExportFormat::Text,
            output: Some(PathBuf::from("out.txt")),
        })
    );
    assert!(Args::try_parse_from(["samvad", "export", "--format", "pdf"]).is_err());
}

#[test]
fn conversation_subcommands_parse() {
    let args = parse_args(&["samvad", "conv", "rename", "2", "Trip", "plans"]);
    assert_eq!(
        args.command,
        Some(Commands::Conversations {
            command: Some(ConversationCommands::Rename {
                selector: "2".to_string(),
                title: vec!["Trip".to_string(), "plans".to_string()],
            })
        })
    );
    let args = parse_args(&["samvad", "conversations"]);
    assert_eq!(args.command, Some(Commands::Conversations { command: None }));
}

#[test]
fn unknown_setting_key_is_reported() {
    let store = SharedStore::new(ConversationStore::new());
    let dir = tempfile::TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    let mut ctx = SetContext {
        config_path: &config_path,
        chat: &store,
    };
    assert!(matches!(
        apply_setting("colour", None, &mut ctx),
        Err(SettingError::UnknownKey(key)) if key == "colour"
    ));
    assert!(apply_setting("streaming", Some(&["off".to_string()]), &mut ctx).is_ok());
}

#[tokio::test]
async fn say_stores_the_reply() {
    let body = serde_json::to_string(&ChatEnvelope::reply("Namaste!")).expect("encode");
    let orchestrator = ChatOrchestrator::new(
        SharedStore::new(ConversationStore::new()),
        FixedTransport::new(200, body),
        TurnSettings::default(),
    );

    say::run_say(&orchestrator, vec!["hello".to_string(), "there".to_string()])
        .await
        .expect("reply");

    let messages = orchestrator
        .store()
        .read(|store| store.get_current().map(|c| c.messages.clone()))
        .expect("conversation");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "hello there");
    assert_eq!(messages[1].content, "Namaste!");
}

#[tokio::test]
async fn say_fails_with_guidance() {
    let orchestrator = ChatOrchestrator::new(
        SharedStore::new(ConversationStore::new()),
        FixedTransport::new(
            429,
            r#"{"success":false,"error":"Rate limit exceeded. Please try again later."}"#
                .to_string(),
        ),
        TurnSettings::default(),
    );

    let err = say::run_say(&orchestrator, vec!["hello".to_string()])
        .await
        .expect_err("rate limited");
    assert!(err.to_string().starts_with("Rate Limit Reached"));

    let last = orchestrator
        .store()
        .read(|store| store.get_current().and_then(|c| c.last_message().cloned()))
        .expect("error message");
    assert_eq!(last.status, MessageStatus::Error);
}

#[tokio::test]
async fn say_rejects_an_empty_prompt() {
    let orchestrator = ChatOrchestrator::new(
        SharedStore::new(ConversationStore::new()),
        FixedTransport::new(200, String::new()),
        TurnSettings::default(),
    );
    assert!(say::run_say(&orchestrator, Vec::new()).await.is_err());
    assert!(say::run_say(&orchestrator, vec!["<>".to_string()]).await.is_err());
    assert!(orchestrator.store().read(|store| store.conversations().is_empty()));
}
