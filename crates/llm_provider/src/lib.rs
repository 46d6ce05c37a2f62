//! Minimal provider-agnostic contract for streaming chat completions.
//!
//! This crate intentionally defines only the shared message model and the
//! completion-stream contract. It excludes provider transport details,
//! wire payloads, and session orchestration concerns.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role attached to one conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Model,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One role-tagged message in a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// Immutable metadata describing a completion client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Error surfaced by a completion client.
///
/// Everything here is fatal from the session loop's perspective; callers
/// that want to recover wrap these at the call site.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("provider configuration: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed reply stream: {0}")]
    Stream(String),
}

/// Live byte stream of one incremental model reply.
///
/// Chunk boundaries carry no meaning; consumers must tolerate arbitrary
/// splits. Dropping the stream cancels the underlying request.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<Bytes, CompletionError>> + Send>>;

/// Provider interface: given an ordered message history, produce a live
/// reply stream.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Starts one completion over the full conversation so far.
    async fn complete(&self, messages: &[Message]) -> Result<ReplyStream, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::{Message, Role};

    #[test]
    fn message_constructors_tag_roles() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::model("m").role, Role::Model);
        assert_eq!(Message::user("hello").content, "hello");
    }

    #[test]
    fn role_names_are_stable() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Model.as_str(), "model");
    }

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_string(&Message::user("hi")).expect("message serializes");
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
