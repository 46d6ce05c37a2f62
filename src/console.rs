//! Terminal-facing I/O: the shared display sink, the prompt source, and
//! the yes/no confirmation protocol.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::task;

use crate::chat::ChatError;
use crate::style;

/// Prompt prefix shown before the user's input line.
#[must_use]
pub fn user_ps1() -> String {
    style::dim("you> ")
}

/// Prompt prefix mirrored in front of the model's reply lines.
#[must_use]
pub fn model_ps1() -> String {
    style::dim("spool> ")
}

/// Ordered display sink shared by the reply parser and command handlers.
///
/// Writes are serialized by a mutex and flushed immediately, so the
/// transcript on screen matches byte arrival order.
#[derive(Clone)]
pub struct Display {
    sink: Arc<Mutex<DisplaySink>>,
}

enum DisplaySink {
    Stdout,
    Buffer(Vec<u8>),
}

impl Display {
    #[must_use]
    pub fn stdout() -> Self {
        Self {
            sink: Arc::new(Mutex::new(DisplaySink::Stdout)),
        }
    }

    /// In-memory sink for tests.
    #[must_use]
    pub fn buffer() -> Self {
        Self {
            sink: Arc::new(Mutex::new(DisplaySink::Buffer(Vec::new()))),
        }
    }

    pub fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        let mut sink = lock_unpoisoned(&self.sink);
        match &mut *sink {
            DisplaySink::Stdout => {
                let mut stdout = io::stdout();
                stdout.write_all(bytes)?;
                stdout.flush()
            }
            DisplaySink::Buffer(buffer) => {
                buffer.extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    pub fn write_str(&self, text: &str) -> io::Result<()> {
        self.write_bytes(text.as_bytes())
    }

    /// Bytes captured so far (empty for the stdout sink).
    #[must_use]
    pub fn captured(&self) -> Vec<u8> {
        match &*lock_unpoisoned(&self.sink) {
            DisplaySink::Stdout => Vec::new(),
            DisplaySink::Buffer(buffer) => buffer.clone(),
        }
    }
}

/// Result of one confirmation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub approved: bool,
    /// The user's raw reply, preserved as the denial reason.
    pub reply: String,
}

impl Confirmation {
    fn from_reply(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self {
                approved: false,
                reply: "no".to_string(),
            };
        }

        // Only a small literal set counts as approval; everything else,
        // however phrased, is a denial carrying the reply verbatim.
        Self {
            approved: matches!(trimmed, "y" | "yes" | "ok"),
            reply: trimmed.to_string(),
        }
    }
}

enum PromptInput {
    Interactive {
        editor: Arc<Mutex<DefaultEditor>>,
        initial: Option<String>,
    },
    /// One pre-supplied prompt (args, file, or piped stdin), then end of input.
    Once(Option<String>),
    /// Scripted lines for tests.
    Scripted(VecDeque<String>),
}

/// The prompt source plus the display, cloneable into command handlers.
#[derive(Clone)]
pub struct Console {
    display: Display,
    input: Arc<tokio::sync::Mutex<PromptInput>>,
}

impl Console {
    pub fn interactive(initial: Option<String>) -> Result<Self, ChatError> {
        let editor = DefaultEditor::new()
            .map_err(|error| ChatError::Input(format!("readline init: {error}")))?;
        Ok(Self {
            display: Display::stdout(),
            input: Arc::new(tokio::sync::Mutex::new(PromptInput::Interactive {
                editor: Arc::new(Mutex::new(editor)),
                initial,
            })),
        })
    }

    #[must_use]
    pub fn once(prompt: Option<String>) -> Self {
        Self {
            display: Display::stdout(),
            input: Arc::new(tokio::sync::Mutex::new(PromptInput::Once(prompt))),
        }
    }

    /// Scripted input against a capturing display, for tests.
    #[must_use]
    pub fn scripted(lines: Vec<String>, display: Display) -> Self {
        Self {
            display,
            input: Arc::new(tokio::sync::Mutex::new(PromptInput::Scripted(
                lines.into(),
            ))),
        }
    }

    #[must_use]
    pub fn display(&self) -> Display {
        self.display.clone()
    }

    /// Obtains the next user prompt, or `EndOfInput` when the source is
    /// exhausted. Ctrl-C at the prompt surfaces as `Interrupted`.
    pub async fn read_prompt(&self) -> Result<String, ChatError> {
        let mut input = self.input.lock().await;
        match &mut *input {
            PromptInput::Once(text) => text.take().ok_or(ChatError::EndOfInput),
            PromptInput::Scripted(lines) => lines.pop_front().ok_or(ChatError::EndOfInput),
            PromptInput::Interactive { editor, initial } => {
                if let Some(text) = initial.take() {
                    return Ok(text);
                }
                read_line_blocking(Arc::clone(editor), user_ps1()).await
            }
        }
    }

    /// Asks a yes/no question and classifies the free-text reply.
    pub async fn confirm(&self, question: &str) -> Result<Confirmation, ChatError> {
        self.display.write_str(&format!(
            "{}{question} (yes / no){}\n",
            style::esc(&[93]),
            style::reset()
        ))?;

        let reply = {
            let mut input = self.input.lock().await;
            match &mut *input {
                PromptInput::Scripted(lines) => lines.pop_front().ok_or(ChatError::EndOfInput)?,
                PromptInput::Interactive { editor, .. } => {
                    read_line_blocking(Arc::clone(editor), String::new()).await?
                }
                // Nobody is there to approve; treat as denial.
                PromptInput::Once(_) => "no (non-interactive session)".to_string(),
            }
        };

        Ok(Confirmation::from_reply(&reply))
    }
}

async fn read_line_blocking(
    editor: Arc<Mutex<DefaultEditor>>,
    prompt: String,
) -> Result<String, ChatError> {
    let line = task::spawn_blocking(move || {
        let mut editor = lock_unpoisoned(&editor);
        editor.readline(&prompt)
    })
    .await
    .map_err(|error| ChatError::Input(format!("input task failed: {error}")))?;

    line.map_err(|error| match error {
        ReadlineError::Interrupted => ChatError::Interrupted,
        ReadlineError::Eof => ChatError::EndOfInput,
        other => ChatError::Input(other.to_string()),
    })
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Confirmation, Console, Display};

    #[test]
    fn only_exact_affirmative_tokens_approve() {
        for token in ["y", "yes", "ok"] {
            assert!(Confirmation::from_reply(token).approved, "{token}");
        }
        for token in ["Y", "YES", "Ok", "yes please", "sure", "no"] {
            assert!(!Confirmation::from_reply(token).approved, "{token}");
        }
    }

    #[test]
    fn blank_replies_deny_with_a_stock_reason() {
        let confirmation = Confirmation::from_reply("   ");
        assert!(!confirmation.approved);
        assert_eq!(confirmation.reply, "no");
    }

    #[test]
    fn denial_preserves_the_raw_reply() {
        let confirmation = Confirmation::from_reply("no, wrong file");
        assert!(!confirmation.approved);
        assert_eq!(confirmation.reply, "no, wrong file");
    }

    #[tokio::test]
    async fn non_interactive_confirmation_denies() {
        let console = Console::once(Some("unused".to_string()));
        let confirmation = console.confirm("Write it?").await.expect("confirm runs");
        assert!(!confirmation.approved);
        assert!(confirmation.reply.contains("non-interactive"));
    }

    #[tokio::test]
    async fn scripted_prompts_drain_then_signal_end_of_input() {
        let console = Console::scripted(vec!["first".to_string()], Display::buffer());
        assert_eq!(console.read_prompt().await.expect("first prompt"), "first");
        assert!(console.read_prompt().await.is_err());
    }
}
