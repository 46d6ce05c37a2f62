use llm_provider::CompletionError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeminiApiError {
    #[error("missing API key")]
    MissingApiKey,

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} {message}")]
    Status { status: StatusCode, message: String },
}

impl From<GeminiApiError> for CompletionError {
    fn from(error: GeminiApiError) -> Self {
        match error {
            GeminiApiError::MissingApiKey => Self::Config("missing GEMINI_API_KEY".to_string()),
            GeminiApiError::Request(error) => Self::Transport(error.to_string()),
            GeminiApiError::Status { status, message } => Self::Status {
                status: status.as_u16(),
                message,
            },
        }
    }
}
