//! Agent mode: the model drives a restricted command interpreter, one
//! command per reply, with results fed back as the next turn's input.

pub mod commands;
pub mod error;
pub mod parser;

use std::sync::Arc;

use commands::CommandRegistry;
use error::AgentError;
use parser::ReplyParser;

use crate::chat::{Chat, ChatError};

const PROMPT_TEMPLATE: &str = include_str!("prompt.md");

/// Runs the agent session loop until end of input or interrupt.
///
/// Recoverable interpreter and command errors are rendered with their
/// corrective hint and re-injected as the next prompt so the model can
/// self-correct; they never end the session.
pub async fn run(chat: &mut Chat) -> Result<(), ChatError> {
    let registry = Arc::new(CommandRegistry::builtin());
    chat.set_system_prompt(system_prompt(&registry));
    tracing::debug!("beginning agent session");

    let mut input = String::new();
    loop {
        match take_turn(chat, &registry, &input).await {
            Ok(output) => input = output,
            Err(AgentError::Fixable(error)) => {
                tracing::debug!(%error, "recoverable agent error");
                input = error.feedback();
            }
            Err(AgentError::Chat(ChatError::EndOfInput | ChatError::Interrupted)) => {
                return Ok(());
            }
            Err(AgentError::Chat(error)) => return Err(error),
        }
    }
}

/// One agent turn: send the input, parse the streamed reply, and return
/// the dispatched command's result.
///
/// Ctrl-C mid-reply abandons the turn: partial display output stays, the
/// partial reply is discarded from history, and control returns to the
/// user for the next prompt.
async fn take_turn(
    chat: &mut Chat,
    registry: &Arc<CommandRegistry>,
    input: &str,
) -> Result<String, AgentError> {
    let stream = chat.send(input).await.map_err(AgentError::Chat)?;
    let parser = ReplyParser::new(Arc::clone(registry), chat.console.clone());

    let (transcript, result) = tokio::select! {
        outcome = parser.handle(stream) => outcome,
        _ = tokio::signal::ctrl_c() => {
            chat.console.display().write_str("\n")?;
            let next = chat.console.read_prompt().await.map_err(AgentError::Chat)?;
            return Ok(next);
        }
    };

    match result {
        Ok(output) => {
            if !transcript.is_empty() {
                chat.record_reply(transcript);
            }
            Ok(output)
        }
        Err(AgentError::Fixable(error)) => {
            // The model's words stay in history so it can see what the
            // feedback refers to.
            if !transcript.is_empty() {
                chat.record_reply(transcript);
            }
            Err(AgentError::Fixable(error))
        }
        Err(error) => Err(error),
    }
}

/// Renders the agent system prompt with the registry's command list.
fn system_prompt(registry: &CommandRegistry) -> String {
    PROMPT_TEMPLATE.replacen("#{COMMANDS}", &registry.catalog(), 1)
}
