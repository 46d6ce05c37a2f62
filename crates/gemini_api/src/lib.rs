//! Transport-only Gemini streaming client primitives.
//!
//! Covers the `streamGenerateContent` SSE endpoint: request building,
//! role/system-instruction mapping, and incremental frame decoding.

pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::GeminiClient;
pub use config::GeminiConfig;
pub use error::GeminiApiError;
pub use payload::GenerateRequest;
pub use sse::SseStreamParser;

/// Default model used when no selection flag is given.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
/// Default model for the thinking toggle.
pub const DEFAULT_THINKING_MODEL: &str = "gemini-3-pro-preview";
