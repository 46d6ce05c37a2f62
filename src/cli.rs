//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "spool",
    version,
    about = "Streaming chat client for LLM providers, with an optional agent mode"
)]
pub struct Cli {
    /// Model to use (a gpt-*/o* or gemini-* id).
    #[arg(long)]
    pub model: Option<String>,

    /// Use Gemini defaults when no model is given.
    #[arg(short = 'g', long)]
    pub gemini: bool,

    /// Prefer a thinking model.
    #[arg(short = 't', long)]
    pub thinking: bool,

    /// Reasoning effort for models that support it.
    #[arg(long)]
    pub effort: Option<String>,

    /// System prompt override. Defaults to a prompt with basic OS and
    /// session info.
    #[arg(long)]
    pub system: Option<String>,

    /// Load the first prompt from a file instead of stdin.
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Stay interactive after a prompt file or argument prompt.
    #[arg(long)]
    pub interactive: bool,

    /// Run as an automated agent with access to commands.
    #[arg(long)]
    pub agent: bool,

    /// List available models and exit.
    #[arg(long)]
    pub models: bool,

    /// Save the finished transcript under this session name.
    #[arg(long)]
    pub save: Option<String>,

    /// Resume a stored session by id and update it on exit.
    #[arg(long)]
    pub resume: Option<String>,

    /// List stored sessions and exit.
    #[arg(long)]
    pub sessions: bool,

    /// Verbose debug logging on stderr.
    #[arg(long)]
    pub debug: bool,

    /// Prompt words; joined with spaces when present.
    pub prompt: Vec<String>,
}

impl Cli {
    /// Model selection: explicit flag, otherwise the provider default,
    /// with the thinking toggle picking the reasoning variant.
    #[must_use]
    pub fn resolve_model(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }

        let default = if self.gemini {
            if self.thinking {
                gemini_api::DEFAULT_THINKING_MODEL
            } else {
                gemini_api::DEFAULT_MODEL
            }
        } else if self.thinking {
            openai_api::DEFAULT_THINKING_MODEL
        } else {
            openai_api::DEFAULT_MODEL
        };
        default.to_string()
    }

    #[must_use]
    pub fn prompt_from_args(&self) -> Option<String> {
        if self.prompt.is_empty() {
            None
        } else {
            Some(self.prompt.join(" "))
        }
    }
}

/// Gemini models are routed by id prefix.
#[must_use]
pub fn is_gemini_model(model: &str) -> bool {
    model.starts_with("gemini-")
}
