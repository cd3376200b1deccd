//! One-shot "say" command: send a single message and print the reply.

use std::error::Error;

use crate::cli::chat::stream_turn;
use crate::cli::transcript::TranscriptOptions;
use crate::core::chat_stream::ChatTransport;
use crate::core::orchestrator::{ChatOrchestrator, TurnOutcome};

const SAY_OPTIONS: TranscriptOptions = TranscriptOptions {
    labels: false,
    timestamps: false,
    show_errors: false,
};

pub async fn run_say<T: ChatTransport>(
    orchestrator: &ChatOrchestrator<T>,
    prompt: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("Usage: samvad say <prompt>".into());
    }

    match stream_turn(orchestrator, &prompt, SAY_OPTIONS).await? {
        TurnOutcome::Replied(_) => Ok(()),
        TurnOutcome::Cancelled(_) => {
            println!();
            Ok(())
        }
        TurnOutcome::Rejected => Err("Nothing to send after removing markup".into()),
        TurnOutcome::Failed(failure) => {
            // The store holds the same guidance the chat view shows.
            let guidance = orchestrator.store().read(|store| {
                store
                    .conversation(&failure.conversation_id)
                    .and_then(|conversation| conversation.message(&failure.error_message_id))
                    .map(|message| message.content.clone())
            });
            Err(guidance.unwrap_or(failure.detail).into())
        }
    }
}
