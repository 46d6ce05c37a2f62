use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use llm_provider::{CompletionClient, CompletionError, Message, ProviderProfile, ReplyStream};
use reqwest::Client;

use crate::config::GeminiConfig;
use crate::error::GeminiApiError;
use crate::payload::GenerateRequest;
use crate::sse::SseStreamParser;
use crate::url::stream_generate_url;

#[derive(Debug)]
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiApiError> {
        if config.api_key.trim().is_empty() {
            return Err(GeminiApiError::MissingApiKey);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(GeminiApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    async fn send(&self, request: &GenerateRequest) -> Result<reqwest::Response, GeminiApiError> {
        let response = self
            .http
            .post(stream_generate_url(&self.config.base_url, &self.config.model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(GeminiApiError::Status { status, message });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: "gemini".to_string(),
            model_id: self.config.model.clone(),
        }
    }

    async fn complete(&self, messages: &[Message]) -> Result<ReplyStream, CompletionError> {
        let request = GenerateRequest::from_messages(messages);
        let response = self.send(&request).await.map_err(CompletionError::from)?;

        let upstream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|error| CompletionError::Transport(error.to_string())));
        Ok(decode_reply_stream(upstream))
    }
}

struct DecodeState {
    upstream: Pin<Box<dyn Stream<Item = Result<Bytes, CompletionError>> + Send>>,
    parser: SseStreamParser,
    pending: VecDeque<Result<Bytes, CompletionError>>,
    done: bool,
}

/// Decode a Gemini SSE byte stream into raw reply-text chunks. The stream
/// ends when the upstream ends; no terminator is synthesized.
fn decode_reply_stream<S>(upstream: S) -> ReplyStream
where
    S: Stream<Item = Result<Bytes, CompletionError>> + Send + 'static,
{
    let state = DecodeState {
        upstream: Box::pin(upstream),
        parser: SseStreamParser::default(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.upstream.next().await {
                Some(Ok(chunk)) => {
                    for delta in state.parser.feed(&chunk) {
                        state.pending.push_back(Ok(Bytes::from(delta)));
                    }
                }
                Some(Err(error)) => {
                    state.done = true;
                    state.pending.push_back(Err(error));
                }
                None => {
                    state.done = true;
                }
            }
        }
    }))
}
