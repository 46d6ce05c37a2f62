use llm_provider::CompletionError;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenAiApiError {
    #[error("missing API key")]
    MissingApiKey,

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} {message}")]
    Status { status: StatusCode, message: String },

    #[error("retry exhausted after max attempts (last error: {last_error:?})")]
    RetryExhausted { last_error: Option<String> },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<OpenAiApiError> for CompletionError {
    fn from(error: OpenAiApiError) -> Self {
        match error {
            OpenAiApiError::MissingApiKey => {
                Self::Config("missing OPENAI_API_KEY".to_string())
            }
            OpenAiApiError::Status { status, message } => Self::Status {
                status: status.as_u16(),
                message,
            },
            OpenAiApiError::Request(error) => Self::Transport(error.to_string()),
            OpenAiApiError::RetryExhausted { .. } => Self::Transport(error.to_string()),
            OpenAiApiError::Serde(error) => Self::Stream(error.to_string()),
        }
    }
}

/// Error body shape returned by the API on non-success statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub value: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

/// Extract a human-readable message from an error response body, falling
/// back to the raw body or the status reason when the shape is unfamiliar.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorPayload { value: Some(fields) }) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = fields.message.filter(|value| !value.is_empty()) {
            return match fields.type_.filter(|value| !value.is_empty()) {
                Some(kind) => format!("{kind}: {message}"),
                None => message,
            };
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
