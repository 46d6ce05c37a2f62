//! Streaming command-line chat client for LLM providers.
//!
//! The root crate wires the provider transports, the console, and the
//! agent reply interpreter together. Plain mode is a REPL that mirrors
//! streamed replies to the display; agent mode lets the model drive a
//! restricted command set, one command per reply, with destructive
//! actions gated behind user confirmation.

pub mod agent;
pub mod chat;
pub mod cli;
pub mod console;
pub mod style;
