//! Interactive line-oriented chat.

use std::error::Error;
use std::future::Future;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::conversations::{list_lines, render_transcript, resolve_selector};
use crate::cli::transcript::{TranscriptOptions, TranscriptPrinter};
use crate::core::chat_stream::ChatTransport;
use crate::core::orchestrator::{ChatOrchestrator, TurnOutcome};
use crate::core::store::{DEFAULT_CONVERSATION_TITLE, SharedStore};

/// Below this many remaining requests the REPL warns about the rate limit.
const LOW_REMAINING_REQUESTS: u32 = 5;

const REPL_HELP: &str = "Commands:
  /new [title]        Start a new conversation
  /list               List conversations
  /switch <n|id>      Switch to another conversation
  /show               Reprint the current conversation
  /rename <title>     Rename the current conversation
  /delete             Delete the current conversation
  /help               Show this help
  /quit               Leave (Ctrl+D works too)

Press Ctrl+C while a reply is arriving to stop it.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Quit,
    Help,
    New(Option<String>),
    List,
    Switch(String),
    Show,
    Rename(String),
    Delete,
    Unknown(String),
}

impl ReplCommand {
    /// `None` when `line` is a chat message rather than a command.
    pub fn parse(line: &str) -> Option<Self> {
        let body = line.trim().strip_prefix('/')?;
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };
        let argument = (!rest.is_empty()).then(|| rest.to_string());

        Some(match (name.to_ascii_lowercase().as_str(), argument) {
            ("quit" | "exit" | "q", _) => ReplCommand::Quit,
            ("help" | "?", _) => ReplCommand::Help,
            ("new", title) => ReplCommand::New(title),
            ("list" | "ls", _) => ReplCommand::List,
            ("switch", Some(selector)) => ReplCommand::Switch(selector),
            ("show", _) => ReplCommand::Show,
            ("rename", Some(title)) => ReplCommand::Rename(title),
            ("delete", _) => ReplCommand::Delete,
            _ => ReplCommand::Unknown(line.trim().to_string()),
        })
    }
}

fn emit(text: &str) -> io::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let mut stdout = io::stdout();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}

/// Run one turn, printing the reply as it grows. Ctrl+C cancels the turn.
pub async fn stream_turn<T: ChatTransport>(
    orchestrator: &ChatOrchestrator<T>,
    input: &str,
    options: TranscriptOptions,
) -> io::Result<TurnOutcome> {
    stream_turn_until(orchestrator, input, options, tokio::signal::ctrl_c()).await
}

/// Like [`stream_turn`], cancelling when `interrupt` resolves.
pub async fn stream_turn_until<T: ChatTransport, F: Future>(
    orchestrator: &ChatOrchestrator<T>,
    input: &str,
    options: TranscriptOptions,
    interrupt: F,
) -> io::Result<TurnOutcome> {
    let store = orchestrator.store().clone();
    let mut revisions = store.subscribe();
    let mut printer = TranscriptPrinter::new(options);
    store.read(|store| {
        if let Some(conversation) = store.get_current() {
            printer.mark_seen(conversation);
        }
    });

    let cancel = CancellationToken::new();
    let turn = orchestrator.send_message_with_cancel(input, cancel.clone());
    // One listener for the whole turn, so an interrupt that lands while a
    // revision is being printed is still seen.
    tokio::pin!(turn, interrupt);

    let outcome = loop {
        tokio::select! {
            biased;
            outcome = &mut turn => break outcome,
            _ = &mut interrupt, if !cancel.is_cancelled() => {
                debug!("cancelling turn on interrupt");
                cancel.cancel();
            }
            Ok(()) = revisions.changed() => {
                emit(&render_current(&store, &mut printer))?;
            }
        }
    };
    emit(&render_current(&store, &mut printer))?;
    Ok(outcome)
}

fn render_current(store: &SharedStore, printer: &mut TranscriptPrinter) -> String {
    store.read(|store| {
        store
            .get_current()
            .map(|conversation| printer.render(conversation))
            .unwrap_or_default()
    })
}

pub async fn run_chat<T: ChatTransport>(
    orchestrator: &ChatOrchestrator<T>,
) -> Result<(), Box<dyn Error>> {
    let store = orchestrator.store().clone();
    let current = store.read(|store| store.get_current().map(|c| c.title.clone()));
    match current {
        Some(title) => println!("Continuing \"{title}\". Type /help for commands."),
        None => println!("Type a message to start chatting, or /help for commands."),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        emit("you> ")?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };

        if let Some(command) = ReplCommand::parse(&line) {
            if !run_command(&store, command) {
                break;
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let options = store.read(|store| TranscriptOptions {
            labels: true,
            timestamps: store.config().show_timestamps,
            show_errors: true,
        });
        let outcome = stream_turn(orchestrator, &line, options).await?;
        report_outcome(&outcome);
    }
    Ok(())
}

fn report_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Rejected => println!("(nothing to send)"),
        TurnOutcome::Cancelled(_) => println!("\n⏹  Reply stopped."),
        TurnOutcome::Replied(_) | TurnOutcome::Failed(_) => {}
    }
    if let Some(info) = outcome.rate_limit() {
        if info.remaining <= LOW_REMAINING_REQUESTS {
            println!(
                "ℹ️  {} of {} requests left in this window.",
                info.remaining, info.limit
            );
        }
    }
}

/// Apply a REPL command. Returns `false` when the session should end.
fn run_command(store: &SharedStore, command: ReplCommand) -> bool {
    match command {
        ReplCommand::Quit => return false,
        ReplCommand::Help => println!("{REPL_HELP}"),
        ReplCommand::New(title) => {
            let title = title.unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string());
            store.with(|store| store.create_conversation(Some(&title)));
            println!("Started \"{title}\".");
        }
        ReplCommand::List => {
            let lines = store.read(list_lines);
            if lines.is_empty() {
                println!("No conversations yet.");
            }
            for line in lines {
                println!("{line}");
            }
        }
        ReplCommand::Switch(selector) => {
            let switched = store.with(|store| {
                let id = resolve_selector(store, &selector)?;
                store.set_current_conversation(Some(&id));
                Ok::<_, String>(store.get_current().map(|c| c.title.clone()))
            });
            match switched {
                Ok(Some(title)) => println!("Switched to \"{title}\"."),
                Ok(None) => {}
                Err(message) => eprintln!("❌ {message}"),
            }
        }
        ReplCommand::Show => {
            let transcript = store.read(|store| {
                store
                    .get_current()
                    .map(|c| render_transcript(c, store.config().show_timestamps))
            });
            match transcript {
                Some(text) => print!("{text}"),
                None => println!("No conversation selected."),
            }
        }
        ReplCommand::Rename(title) => {
            let renamed = store.with(|store| {
                let id = store.current_conversation_id()?.to_string();
                store
                    .rename_conversation(&id, &title)
                    .then_some(())
            });
            match renamed {
                Some(()) => println!("Renamed to \"{title}\"."),
                None => println!("No conversation selected."),
            }
        }
        ReplCommand::Delete => {
            let deleted = store.with(|store| {
                let id = store.current_conversation_id()?.to_string();
                store.delete_conversation(&id);
                Some(id)
            });
            match deleted {
                Some(_) => println!("Conversation deleted."),
                None => println!("No conversation selected."),
            }
        }
        ReplCommand::Unknown(line) => {
            eprintln!("❌ Unknown command: {line}. Type /help for commands.");
        }
    }
    true
}
