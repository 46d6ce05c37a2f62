//! Transport-only OpenAI chat-completions client primitives.
//!
//! This crate owns request building, SSE reply decoding, and retry policy
//! for the OpenAI chat-completions endpoint family. It intentionally
//! contains no prompt-construction or session logic.

pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::OpenAiClient;
pub use config::OpenAiConfig;
pub use error::OpenAiApiError;
pub use payload::ChatRequest;
pub use sse::{ChatStreamEvent, SseStreamParser};

/// Default model used when no selection flag is given.
pub const DEFAULT_MODEL: &str = "gpt-4.1";
/// Default model for the thinking toggle.
pub const DEFAULT_THINKING_MODEL: &str = "o1";
