use std::time::Duration;

use crate::url::DEFAULT_OPENAI_BASE_URL;

/// Transport configuration for OpenAI API requests.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Bearer token passed to `Authorization`.
    pub api_key: String,
    /// Model id sent with every completion request.
    pub model: String,
    /// Base URL for the API; paths are appended during normalization.
    pub base_url: String,
    /// Optional `reasoning_effort` parameter for models that support it.
    pub reasoning_effort: Option<String>,
    /// Optional request timeout.
    pub timeout: Option<Duration>,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            reasoning_effort: None,
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
