//! Chat session state and the plain (non-agent) REPL loop.

use futures_util::StreamExt;
use llm_provider::{CompletionClient, CompletionError, Message, Role};
use thiserror::Error;

use crate::console::Console;

/// Session-level errors. `EndOfInput` and `Interrupted` terminate the loop
/// cleanly; everything else is fatal and reaches the process exit path.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("end of input")]
    EndOfInput,

    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("display write failed: {0}")]
    Display(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] session_store::SessionStoreError),

    #[error("terminal input: {0}")]
    Input(String),

    #[error("{0}")]
    Internal(String),
}

/// One conversation: provider client, console, and append-only history.
pub struct Chat {
    client: Box<dyn CompletionClient>,
    pub console: Console,
    messages: Vec<Message>,
    interactive: bool,
}

impl Chat {
    #[must_use]
    pub fn new(
        client: Box<dyn CompletionClient>,
        console: Console,
        messages: Vec<Message>,
        interactive: bool,
    ) -> Self {
        Self {
            client,
            console,
            messages,
            interactive,
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Replaces the leading system message, or inserts one.
    pub fn set_system_prompt(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.messages.first_mut() {
            Some(first) if first.role == Role::System => first.content = text,
            _ => self.messages.insert(0, Message::system(text)),
        }
    }

    /// Appends the prompt as a user message and starts a completion over
    /// the conversation so far.
    pub async fn send(&mut self, prompt: &str) -> Result<llm_provider::ReplyStream, ChatError> {
        self.messages.push(Message::user(prompt));
        tracing::debug!(history = self.messages.len(), "requesting completion");
        Ok(self.client.complete(&self.messages).await?)
    }

    /// Records a completed model reply in history.
    pub fn record_reply(&mut self, text: impl Into<String>) {
        self.messages.push(Message::model(text));
    }

    /// Plain REPL: read a prompt, stream the reply to the display, repeat.
    /// End of input or Ctrl-C at the prompt exits cleanly.
    pub async fn run(&mut self) -> Result<(), ChatError> {
        loop {
            let prompt = match self.console.read_prompt().await {
                Ok(prompt) => prompt,
                Err(ChatError::EndOfInput | ChatError::Interrupted) => return Ok(()),
                Err(error) => return Err(error),
            };

            self.take_turn(&prompt).await?;

            if !self.interactive {
                return Ok(());
            }
        }
    }

    /// One streamed turn. Ctrl-C mid-reply stops the turn without touching
    /// the session: partial display output stays, a newline keeps the next
    /// prompt line clean, and the partial reply is not recorded.
    async fn take_turn(&mut self, prompt: &str) -> Result<(), ChatError> {
        let mut stream = self.send(prompt).await?;
        let display = self.console.display();
        let mut reply_text = String::new();

        let cancelled = tokio::select! {
            copied = async {
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    display.write_bytes(&chunk)?;
                    reply_text.push_str(&String::from_utf8_lossy(&chunk));
                }
                Ok::<bool, ChatError>(false)
            } => copied?,
            _ = tokio::signal::ctrl_c() => true,
        };

        if cancelled {
            display.write_str("\n")?;
            return Ok(());
        }

        self.record_reply(reply_text);
        Ok(())
    }
}
