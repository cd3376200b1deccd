use super::*;
use crate::api::StreamRecord;
use crate::backend::rate_limit::{RateLimitPolicy, RateLimiter, RATE_LIMITED_STATUS};
use crate::core::chat_stream::BackendResponse;
use crate::core::message::{Message, Sender};
use crate::core::settings::PersonalityMode;
use crate::core::store::ConversationStore;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

enum Reply {
    Text(u16, String),
    Stream(ByteStream),
    Unreachable(String),
}

/// What the store looked like at the moment a request went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AtSend {
    user_message_stored: bool,
    loading: bool,
}

/// In-process backend that answers each request with the next scripted reply.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(ChatRequest, bool)>>,
    limiter: Option<RateLimiter>,
    watched: Option<SharedStore>,
    at_send: Mutex<Vec<AtSend>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    fn watching(mut self, store: SharedStore) -> Self {
        self.watched = Some(store);
        self
    }

    fn requests(&self) -> Vec<(ChatRequest, bool)> {
        self.requests.lock().expect("requests").clone()
    }

    fn at_send(&self) -> Vec<AtSend> {
        self.at_send.lock().expect("at_send").clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send_chat(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<BackendResponse, TransportError> {
        self.requests
            .lock()
            .expect("requests")
            .push((request.clone(), stream));

        if let Some(store) = &self.watched {
            let snapshot = store.read(|store| AtSend {
                user_message_stored: store
                    .get_current()
                    .and_then(|conversation| conversation.last_message())
                    .is_some_and(|message| message.is_user() && message.content == request.message),
                loading: store.is_loading(),
            });
            self.at_send.lock().expect("at_send").push(snapshot);
        }

        if let Some(limiter) = &self.limiter {
            let decision = limiter.check("localhost", 1_000);
            if !decision.allowed {
                let body = serde_json::to_string(&decision.rejection()).expect("encode");
                return Ok(BackendResponse::text(RATE_LIMITED_STATUS, body)
                    .with_rate_limit(Some(decision.info)));
            }
        }

        match self.replies.lock().expect("replies").pop_front() {
            Some(Reply::Text(status, body)) => Ok(BackendResponse::text(status, body)),
            Some(Reply::Stream(body)) => Ok(BackendResponse::stream(200, body)),
            Some(Reply::Unreachable(reason)) => Err(TransportError::Interrupted(reason)),
            None => Err(TransportError::Interrupted("no scripted reply".into())),
        }
    }
}

/// Body delivered in the given chunks, yielding to the scheduler before each.
fn chunked(parts: Vec<Vec<u8>>) -> ByteStream {
    let items: Vec<Result<Vec<u8>, TransportError>> = parts.into_iter().map(Ok).collect();
    stream::iter(items)
        .then(|chunk| async move {
            tokio::task::yield_now().await;
            chunk
        })
        .boxed()
}

fn frames(records: Vec<StreamRecord>) -> String {
    records
        .into_iter()
        .map(|record| record.to_frame().expect("frame"))
        .collect()
}

/// Split `body` every `size` bytes, regardless of record or character
/// boundaries.
fn split_every(body: &str, size: usize) -> Vec<Vec<u8>> {
    body.as_bytes().chunks(size).map(<[u8]>::to_vec).collect()
}

fn namaste_stream() -> Vec<StreamRecord> {
    vec![
        StreamRecord::delta("Na", "Na", false),
        StreamRecord::delta("mas", "Namas", false),
        StreamRecord::delta("te", "Namaste", true),
    ]
}

fn orchestrator(transport: ScriptedTransport) -> ChatOrchestrator<ScriptedTransport> {
    ChatOrchestrator::new(
        SharedStore::new(ConversationStore::new()),
        transport,
        TurnSettings::default(),
    )
}

fn current_messages(orchestrator: &ChatOrchestrator<ScriptedTransport>) -> Vec<Message> {
    orchestrator.store().read(|store| {
        store
            .get_current()
            .map(|conversation| conversation.messages.clone())
            .unwrap_or_default()
    })
}

fn assistant_messages(messages: &[Message]) -> Vec<&Message> {
    messages.iter().filter(|m| m.sender == Sender::Assistant).collect()
}

#[tokio::test]
async fn whole_reply_is_appended_after_user_message() {
    let chat = orchestrator(ScriptedTransport::new(vec![Reply::Text(
        200,
        r#"{"success":true,"data":{"content":"Hi! Kaise ho?","timestamp":"2024-03-01T09:30:00.000Z"}}"#
            .into(),
    )]));

    let outcome = chat.send_message("Hello").await;
    assert!(matches!(outcome, TurnOutcome::Replied(_)));

    let messages = current_messages(&chat);
    assert_eq!(messages.len(), 2);
    assert_eq!(
        (messages[0].sender, messages[0].content.as_str(), messages[0].status),
        (Sender::User, "Hello", MessageStatus::Sent)
    );
    assert_eq!(
        (messages[1].sender, messages[1].content.as_str(), messages[1].status),
        (Sender::Assistant, "Hi! Kaise ho?", MessageStatus::Sent)
    );

    let conversation_title = chat
        .store()
        .read(|store| store.get_current().map(|c| c.title.clone()));
    assert_eq!(conversation_title.as_deref(), Some(NEW_CHAT_TITLE));
}

#[tokio::test]
async fn user_message_is_stored_and_loading_raised_before_sending() {
    let store = SharedStore::new(ConversationStore::new());
    let transport = ScriptedTransport::new(vec![Reply::Text(
        200,
        r#"{"success":true,"data":{"content":"Hi!"}}"#.into(),
    )])
    .watching(store.clone());
    let chat = ChatOrchestrator::new(store, transport, TurnSettings::default());

    assert!(!chat.store().read(|store| store.is_loading()));
    let outcome = chat.send_message("Hello").await;
    assert!(matches!(outcome, TurnOutcome::Replied(_)));

    assert_eq!(
        chat.transport.at_send(),
        vec![AtSend {
            user_message_stored: true,
            loading: true,
        }]
    );
    assert!(!chat.store().read(|store| store.is_loading()));
}

#[tokio::test]
async fn streamed_reply_creates_exactly_one_assistant_message() {
    let body = frames(namaste_stream());
    let chat = orchestrator(ScriptedTransport::new(vec![Reply::Stream(chunked(
        split_every(&body, 7),
    ))]));

    let outcome = chat.send_message("Greet me").await;

    let messages = current_messages(&chat);
    let replies = assistant_messages(&messages);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].content, "Namaste");
    assert_eq!(replies[0].status, MessageStatus::Sent);
    match outcome {
        TurnOutcome::Replied(receipt) => {
            assert_eq!(receipt.assistant_message_id.as_deref(), Some(replies[0].id.as_str()))
        }
        other => panic!("expected reply, got {other:?}"),
    }
}

#[tokio::test]
async fn placeholder_grows_through_cumulative_content() {
    let body = frames(namaste_stream());
    let chat = orchestrator(ScriptedTransport::new(vec![Reply::Stream(chunked(
        split_every(&body, 3),
    ))]));

    let mut revisions = chat.store().subscribe();
    let store = chat.store().clone();
    let observed = Arc::new(Mutex::new(Vec::<String>::new()));
    let recorder = Arc::clone(&observed);
    let watcher = tokio::spawn(async move {
        while revisions.changed().await.is_ok() {
            let reply = store.read(|store| {
                store.get_current().and_then(|conversation| {
                    conversation
                        .messages
                        .iter()
                        .find(|m| m.sender == Sender::Assistant)
                        .map(|m| m.content.clone())
                })
            });
            if let Some(content) = reply {
                let mut seen = recorder.lock().expect("observed");
                if seen.last() != Some(&content) {
                    seen.push(content.clone());
                }
                if content == "Namaste" {
                    break;
                }
            }
        }
    });

    chat.send_message("Greet me").await;
    tokio::time::timeout(Duration::from_secs(5), watcher)
        .await
        .expect("watcher finished")
        .expect("watcher ran");

    let seen = observed.lock().expect("observed").clone();
    assert_eq!(seen.last().map(String::as_str), Some("Namaste"));
    // Every observed state is a prefix of the next.
    for pair in seen.windows(2) {
        assert!(pair[1].starts_with(&pair[0]), "{pair:?}");
    }
}

#[tokio::test]
async fn deltas_are_concatenated_without_cumulative_field() {
    let body = "data: {\"content\":\"Dhan\",\"isComplete\":false}\n\n\
                data: {\"content\":\"ya\",\"isComplete\":false}\n\n\
                data: {\"content\":\"vaad\",\"isComplete\":true}\n\n";
    let chat = orchestrator(ScriptedTransport::new(vec![Reply::Stream(chunked(
        split_every(body, 5),
    ))]));

    chat.send_message("Say thanks").await;

    let messages = current_messages(&chat);
    assert_eq!(assistant_messages(&messages)[0].content, "Dhanyavaad");
}

#[tokio::test]
async fn rate_limited_turn_gets_rate_limit_guidance() {
    let limiter = RateLimiter::new(RateLimitPolicy {
        max_requests: 1,
        window: Duration::from_secs(900),
    });
    let chat = orchestrator(
        ScriptedTransport::new(vec![Reply::Text(
            200,
            r#"{"success":true,"data":{"content":"First"}}"#.into(),
        )])
        .with_limiter(limiter),
    );

    assert!(matches!(
        chat.send_message("one").await,
        TurnOutcome::Replied(_)
    ));
    let outcome = chat.send_message("two").await;

    let TurnOutcome::Failed(failure) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, FailureKind::RateLimited);
    assert_eq!(failure.rate_limit.map(|info| info.remaining), Some(0));

    let messages = current_messages(&chat);
    let last = messages.last().expect("error message");
    assert_eq!(last.status, MessageStatus::Error);
    assert!(last.content.starts_with("Rate Limit Reached"));
    assert!(!last.content.contains("Something went wrong"));
}

#[tokio::test]
async fn input_is_sanitized_before_storing_and_sending() {
    let transport = ScriptedTransport::new(vec![Reply::Text(
        200,
        r#"{"success":true,"data":{"content":"ok"}}"#.into(),
    )]);
    let chat = orchestrator(transport);

    chat.send_message("  <script>hi</script>  ").await;

    let messages = current_messages(&chat);
    assert_eq!(messages[0].content, "scripthi/script");
    let requests = chat.transport.requests();
    assert_eq!(requests[0].0.message, "scripthi/script");
}

#[tokio::test]
async fn empty_input_is_rejected_without_side_effects() {
    let chat = orchestrator(ScriptedTransport::new(Vec::new()));

    assert_eq!(chat.send_message("   \n ").await, TurnOutcome::Rejected);
    assert_eq!(chat.send_message("<<>>").await, TurnOutcome::Rejected);

    assert!(chat.transport.requests().is_empty());
    assert!(chat.store().read(|store| store.conversations().is_empty()));
    assert!(!chat.store().read(|store| store.is_loading()));
}

#[tokio::test]
async fn request_carries_previous_messages_and_personality() {
    let chat = orchestrator(ScriptedTransport::new(vec![Reply::Text(
        200,
        r#"{"success":true,"data":{"content":"ok"}}"#.into(),
    )]));
    chat.store().with(|store| {
        store.create_conversation(Some("Long"));
        for index in 0..12 {
            store.add_message(MessageDraft::user(format!("earlier {index}")));
        }
        store.update_config(|config| config.personality.mode = PersonalityMode::Humorous);
    });

    chat.send_message("newest").await;

    let (request, stream) = chat.transport.requests().remove(0);
    assert!(stream);
    assert_eq!(request.personality, "humorous");
    assert_eq!(request.message, "newest");
    let history: Vec<&str> = request
        .conversation_history
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(history.len(), 10);
    assert_eq!(history.first().copied(), Some("earlier 2"));
    assert_eq!(history.last().copied(), Some("earlier 11"));
}

#[tokio::test]
async fn every_failure_appends_exactly_one_error_message() {
    let mid_stream_error = frames(vec![
        StreamRecord::delta("Hal", "Hal", false),
        StreamRecord::failure("An error occurred while generating the response"),
    ]);
    let truncated = frames(vec![StreamRecord::delta("Hal", "Hal", false)]);
    let scripted = vec![
        (
            Reply::Unreachable("connection refused".into()),
            FailureKind::Generic,
        ),
        (
            Reply::Text(
                500,
                r#"{"success":false,"error":"Gemini API key is not configured. Please add your API key to the .env.local file."}"#.into(),
            ),
            FailureKind::MissingApiKey,
        ),
        (
            Reply::Text(
                401,
                r#"{"success":false,"error":"Invalid API key. Please check your Gemini API key in the .env.local file."}"#.into(),
            ),
            FailureKind::InvalidApiKey,
        ),
        (
            Reply::Text(
                429,
                r#"{"success":false,"error":"API quota exceeded. Please check your Gemini API usage limits."}"#.into(),
            ),
            FailureKind::QuotaExceeded,
        ),
        (Reply::Text(502, "<html>Bad gateway</html>".into()), FailureKind::Generic),
        (Reply::Text(200, "not json".into()), FailureKind::Generic),
        (
            Reply::Text(200, r#"{"success":false}"#.into()),
            FailureKind::Generic,
        ),
        (Reply::Stream(chunked(vec![mid_stream_error.into_bytes()])), FailureKind::Generic),
        (Reply::Stream(chunked(vec![truncated.into_bytes()])), FailureKind::Generic),
    ];

    for (reply, expected_kind) in scripted {
        let chat = orchestrator(ScriptedTransport::new(vec![reply]));
        let outcome = chat.send_message("Hello").await;

        let TurnOutcome::Failed(failure) = outcome else {
            panic!("expected failure for {expected_kind:?}");
        };
        assert_eq!(failure.kind, expected_kind, "{}", failure.detail);

        let messages = current_messages(&chat);
        let replies = assistant_messages(&messages);
        assert_eq!(replies.len(), 1, "{}", failure.detail);
        assert_eq!(replies[0].status, MessageStatus::Error);
        assert_eq!(failure.error_message_id, replies[0].id);
        assert!(!chat.store().read(|store| store.is_loading()));
        assert_eq!(
            chat.store().read(|store| store.error().map(str::to_string)),
            Some(failure.detail.clone())
        );
    }
}

#[tokio::test]
async fn status_line_is_used_when_error_body_has_no_message() {
    let chat = orchestrator(ScriptedTransport::new(vec![Reply::Text(
        502,
        "<html>Bad gateway</html>".into(),
    )]));
    let TurnOutcome::Failed(failure) = chat.send_message("Hello").await else {
        panic!("expected failure");
    };
    assert_eq!(failure.detail, "HTTP error! status: 502");
}

#[tokio::test]
async fn next_turn_clears_previous_error() {
    let chat = orchestrator(ScriptedTransport::new(vec![
        Reply::Unreachable("offline".into()),
        Reply::Text(200, r#"{"success":true,"data":{"content":"back"}}"#.into()),
    ]));

    chat.send_message("first").await;
    assert!(chat.store().read(|store| store.error().is_some()));

    chat.send_message("second").await;
    assert!(chat.store().read(|store| store.error().is_none()));
    assert!(!chat.store().read(|store| store.is_loading()));
}

#[tokio::test]
async fn concurrent_turns_never_cross_apply_updates() {
    let alpha = frames(vec![
        StreamRecord::delta("Alpha ", "Alpha ", false),
        StreamRecord::delta("one", "Alpha one", false),
        StreamRecord::delta("", "Alpha one", true),
    ]);
    let beta = frames(vec![
        StreamRecord::delta("Beta ", "Beta ", false),
        StreamRecord::delta("two", "Beta two", false),
        StreamRecord::delta("", "Beta two", true),
    ]);
    let chat = orchestrator(ScriptedTransport::new(vec![
        Reply::Stream(chunked(split_every(&alpha, 4))),
        Reply::Stream(chunked(split_every(&beta, 4))),
    ]));

    let (first, second) = tokio::join!(chat.send_message("a"), chat.send_message("b"));

    let (TurnOutcome::Replied(first), TurnOutcome::Replied(second)) = (first, second) else {
        panic!("both turns should reply");
    };
    let messages = current_messages(&chat);
    let content_of = |id: &Option<MessageId>| {
        messages
            .iter()
            .find(|m| Some(&m.id) == id.as_ref())
            .map(|m| (m.content.clone(), m.status))
    };
    assert_eq!(
        content_of(&first.assistant_message_id),
        Some(("Alpha one".to_string(), MessageStatus::Sent))
    );
    assert_eq!(
        content_of(&second.assistant_message_id),
        Some(("Beta two".to_string(), MessageStatus::Sent))
    );
    assert_eq!(assistant_messages(&messages).len(), 2);
    assert!(!chat.store().read(|store| store.is_loading()));
}

#[tokio::test]
async fn stream_keeps_landing_in_its_conversation_after_a_switch() {
    let body = frames(namaste_stream());
    let chat = orchestrator(ScriptedTransport::new(vec![Reply::Stream(chunked(
        split_every(&body, 6),
    ))]));
    let store = chat.store().clone();
    let mut revisions = store.subscribe();

    let switcher = async {
        loop {
            let streaming = store.read(|store| {
                store
                    .get_current()
                    .is_some_and(|c| c.messages.iter().any(|m| m.is_streaming()))
            });
            if streaming {
                store.with(|store| store.create_conversation(Some("Elsewhere")));
                break;
            }
            if revisions.changed().await.is_err() {
                break;
            }
        }
    };
    let (outcome, ()) = tokio::join!(chat.send_message("Greet me"), switcher);

    let receipt = match outcome {
        TurnOutcome::Replied(receipt) => receipt,
        other => panic!("expected reply, got {other:?}"),
    };
    store.read(|store| {
        assert_eq!(store.get_current().map(|c| c.title.as_str()), Some("Elsewhere"));
        assert!(store.get_current().is_some_and(|c| c.messages.is_empty()));
        let original = store
            .conversation(&receipt.conversation_id)
            .expect("original conversation");
        assert_eq!(original.messages.len(), 2);
        assert_eq!(original.messages[1].content, "Namaste");
        assert_eq!(original.messages[1].status, MessageStatus::Sent);
    });
}

/// Delivers `first`, then waits for `gate` before delivering `rest`.
fn gated(first: String, rest: String, gate: oneshot::Receiver<()>) -> ByteStream {
    stream::once(async move { Ok::<_, TransportError>(first.into_bytes()) })
        .chain(stream::once(async move {
            let _ = gate.await;
            Ok(rest.into_bytes())
        }))
        .boxed()
}

/// Deletes the conversation holding the streaming placeholder, then opens
/// `gate`.
async fn delete_streaming_conversation(store: SharedStore, gate: oneshot::Sender<()>) {
    let mut revisions = store.subscribe();
    loop {
        let streaming = store.read(|store| {
            store
                .get_current()
                .filter(|c| c.messages.iter().any(|m| m.is_streaming()))
                .map(|c| c.id.clone())
        });
        if let Some(conversation_id) = streaming {
            store.with(|store| store.delete_conversation(&conversation_id));
            break;
        }
        if revisions.changed().await.is_err() {
            break;
        }
    }
    let _ = gate.send(());
}

#[tokio::test]
async fn failure_after_conversation_deleted_still_leaves_one_error_message() {
    let (gate_tx, gate_rx) = oneshot::channel();
    let body = gated(
        frames(vec![StreamRecord::delta("Na", "Na", false)]),
        frames(vec![StreamRecord::failure("boom")]),
        gate_rx,
    );
    let chat = orchestrator(ScriptedTransport::new(vec![Reply::Stream(body)]));
    let deleter = delete_streaming_conversation(chat.store().clone(), gate_tx);

    let (outcome, ()) = tokio::join!(chat.send_message("Greet me"), deleter);

    let failure = match outcome {
        TurnOutcome::Failed(failure) => failure,
        other => panic!("expected failure, got {other:?}"),
    };
    chat.store().read(|store| {
        assert_eq!(store.conversations().len(), 1);
        let conversation = store.get_current().expect("fallback conversation");
        assert_eq!(conversation.id, failure.conversation_id);
        assert_eq!(conversation.title, NEW_CHAT_TITLE);
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].id, failure.error_message_id);
        assert_eq!(conversation.messages[0].status, MessageStatus::Error);
        assert!(!store.is_loading());
    });
}

#[tokio::test]
async fn reply_after_conversation_deleted_is_kept() {
    let (gate_tx, gate_rx) = oneshot::channel();
    let body = gated(
        frames(vec![StreamRecord::delta("Na", "Na", false)]),
        frames(vec![
            StreamRecord::delta("mas", "Namas", false),
            StreamRecord::delta("te", "Namaste", true),
        ]),
        gate_rx,
    );
    let chat = orchestrator(ScriptedTransport::new(vec![Reply::Stream(body)]));
    let deleter = delete_streaming_conversation(chat.store().clone(), gate_tx);

    let (outcome, ()) = tokio::join!(chat.send_message("Greet me"), deleter);

    let receipt = match outcome {
        TurnOutcome::Replied(receipt) => receipt,
        other => panic!("expected reply, got {other:?}"),
    };
    let reply_id = receipt.assistant_message_id.expect("reply id");
    chat.store().read(|store| {
        let conversation = store
            .conversation(&receipt.conversation_id)
            .expect("fallback conversation");
        assert_eq!(conversation.messages.len(), 1);
        let reply = &conversation.messages[0];
        assert_eq!(reply.id, reply_id);
        assert_eq!(reply.content, "Namaste");
        assert_eq!(reply.status, MessageStatus::Sent);
    });
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn cancellation_keeps_partial_reply_and_releases_stream() {
    let released = Arc::new(AtomicBool::new(false));
    let flag = DropFlag(Arc::clone(&released));
    let first = frames(vec![StreamRecord::delta("Hel", "Hel", false)]);
    let body = stream::iter(vec![Ok(first.into_bytes())])
        .chain(stream::pending())
        .map(move |chunk| {
            let _held = &flag;
            chunk
        })
        .boxed();
    let chat = orchestrator(ScriptedTransport::new(vec![Reply::Stream(body)]));

    let token = CancellationToken::new();
    let canceller = token.clone();
    let store = chat.store().clone();
    let mut revisions = store.subscribe();
    let cancel_after_first_text = async {
        loop {
            let started = store.read(|store| {
                store
                    .get_current()
                    .is_some_and(|c| c.messages.iter().any(|m| m.content == "Hel"))
            });
            if started || revisions.changed().await.is_err() {
                break;
            }
        }
        canceller.cancel();
    };

    let (outcome, ()) = tokio::join!(
        chat.send_message_with_cancel("Hello", token),
        cancel_after_first_text
    );

    let TurnOutcome::Cancelled(receipt) = outcome else {
        panic!("expected cancellation");
    };
    assert!(receipt.assistant_message_id.is_some());
    let messages = current_messages(&chat);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Hel");
    assert_eq!(messages[1].status, MessageStatus::Sent);
    assert!(messages.iter().all(|m| !m.is_error()));
    assert!(released.load(Ordering::SeqCst));
    assert!(!chat.store().read(|store| store.is_loading()));
}

#[tokio::test]
async fn cancellation_before_reply_appends_nothing() {
    let chat = orchestrator(ScriptedTransport::new(vec![Reply::Text(
        200,
        r#"{"success":true,"data":{"content":"late"}}"#.into(),
    )]));
    let token = CancellationToken::new();
    token.cancel();

    let outcome = chat.send_message_with_cancel("Hello", token).await;

    let TurnOutcome::Cancelled(receipt) = outcome else {
        panic!("expected cancellation");
    };
    assert!(receipt.assistant_message_id.is_none());
    let messages = current_messages(&chat);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, Sender::User);
}

#[tokio::test]
async fn non_streaming_preference_is_forwarded() {
    let chat = ChatOrchestrator::new(
        SharedStore::new(ConversationStore::new()),
        ScriptedTransport::new(vec![Reply::Text(
            200,
            r#"{"success":true,"data":{"content":"ok"}}"#.into(),
        )]),
        TurnSettings {
            prefer_streaming: false,
            ..TurnSettings::default()
        },
    );
    chat.send_message("hi").await;
    assert!(!chat.transport.requests()[0].1);
}
