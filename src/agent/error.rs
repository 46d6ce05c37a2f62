//! Error taxonomy for the agent interpreter.
//!
//! A `FixableError` never ends the session: it is rendered as explanation
//! plus corrective hint and fed back to the model as the next turn's
//! input. Everything session-level travels as `ChatError`.

use thiserror::Error;

use crate::chat::ChatError;

#[derive(Debug, Error)]
pub enum FixableError {
    /// The reply did not open with a comment line.
    #[error("unexpected input {0:?}")]
    Format(String),

    /// The first token matched no registered command.
    #[error("invalid command {0:?}")]
    UnknownCommand(String),

    /// Body bytes arrived with no command dispatched.
    #[error("failed to parse a command from the reply")]
    Dispatch,

    /// A command was invoked with the wrong argument shape.
    #[error("{message}")]
    Argument { message: String, hint: String },

    /// The user declined a confirmation prompt.
    #[error("permission denied")]
    PermissionDenied { reply: String },

    /// A command ran and failed.
    #[error("{message}")]
    Failed { message: String, hint: String },
}

impl FixableError {
    #[must_use]
    pub fn argument(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
            hint: hint.into(),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Corrective hint shown to the model alongside the error.
    #[must_use]
    pub fn hint(&self) -> String {
        match self {
            Self::Format(_) => {
                "Every reply must begin with a comment line starting with '#' that explains the command.".to_string()
            }
            Self::UnknownCommand(_) => {
                "Only commands from the available commands list can be used. When stuck, use the prompt command to ask for directions.".to_string()
            }
            Self::Dispatch => {
                "A reply must contain a comment starting with '#', then a command.".to_string()
            }
            Self::Argument { hint, .. } | Self::Failed { hint, .. } => hint.clone(),
            Self::PermissionDenied { reply } => format!("The request was denied: {reply:?}"),
        }
    }

    /// Rendered form fed back as the next turn's input.
    #[must_use]
    pub fn feedback(&self) -> String {
        format!("{self}\n# {}", self.hint())
    }
}

/// Outcome type for one agent turn and its command handlers.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Fixable(#[from] FixableError),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl From<std::io::Error> for AgentError {
    fn from(error: std::io::Error) -> Self {
        Self::Chat(ChatError::Display(error))
    }
}
