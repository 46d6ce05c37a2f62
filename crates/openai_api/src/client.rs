use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use llm_provider::{CompletionClient, CompletionError, Message, ProviderProfile, ReplyStream};
use reqwest::{Client, Response};

use crate::config::OpenAiConfig;
use crate::error::{parse_error_message, OpenAiApiError};
use crate::payload::{ChatRequest, ListModelsResponse};
use crate::retry::{is_retryable_http_error, retry_delay, MAX_RETRIES};
use crate::sse::{ChatStreamEvent, SseStreamParser};
use crate::url::{chat_completions_url, models_url};

#[derive(Debug)]
pub struct OpenAiClient {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, OpenAiApiError> {
        if config.api_key.trim().is_empty() {
            return Err(OpenAiApiError::MissingApiKey);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(OpenAiApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn completion_request(&self, messages: &[Message]) -> ChatRequest {
        ChatRequest::new(&self.config.model, messages)
            .with_reasoning_effort(self.config.reasoning_effort.clone())
    }

    fn build_request(&self, request: &ChatRequest) -> reqwest::RequestBuilder {
        self.http
            .post(chat_completions_url(&self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(request)
    }

    async fn send_with_retry(&self, request: &ChatRequest) -> Result<Response, OpenAiApiError> {
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            match self.build_request(request).send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response);
                    }

                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if attempt < MAX_RETRIES && is_retryable_http_error(status.as_u16(), &body) {
                        tokio::time::sleep(retry_delay(attempt)).await;
                        continue;
                    }

                    return Err(OpenAiApiError::Status { status, message });
                }
                Err(error) => {
                    last_error = Some(error.to_string());
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(retry_delay(attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(OpenAiApiError::RetryExhausted { last_error })
    }

    /// Lists the model ids visible to this API key, sorted ascending.
    pub async fn list_models(&self) -> Result<Vec<String>, OpenAiApiError> {
        let response = self
            .http
            .get(models_url(&self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OpenAiApiError::Status {
                status,
                message: parse_error_message(status, &body),
            });
        }

        let models: ListModelsResponse = response.json().await?;
        let mut ids: Vec<String> = models.data.into_iter().map(|model| model.id).collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: "openai".to_string(),
            model_id: self.config.model.clone(),
        }
    }

    async fn complete(&self, messages: &[Message]) -> Result<ReplyStream, CompletionError> {
        let request = self.completion_request(messages);
        let response = self
            .send_with_retry(&request)
            .await
            .map_err(CompletionError::from)?;

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
    newline_emitted: bool,
}

/// Decode an SSE byte stream into a stream of raw reply-text chunks.
///
/// A trailing newline is emitted when the `[DONE]` sentinel arrives, so a
/// completed reply always ends in `\n` even when the model's final token
/// does not.
fn decode_reply_stream<S>(upstream: S) -> ReplyStream
where
    S: Stream<Item = Result<Bytes, CompletionError>> + Send + 'static,
{
    let state = DecodeState {
        upstream: Box::pin(upstream),
        parser: SseStreamParser::default(),
        pending: VecDeque::new(),
        done: false,
        newline_emitted: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }

            if state.done {
                if !state.newline_emitted {
                    state.newline_emitted = true;
                    return Some((Ok(Bytes::from_static(b"\n")), state));
                }
                return None;
            }

            match state.upstream.next().await {
                Some(Ok(chunk)) => {
                    for event in state.parser.feed(&chunk) {
                        match event {
                            ChatStreamEvent::ContentDelta { delta } if !state.done => {
                                state.pending.push_back(Ok(Bytes::from(delta)));
                            }
                            ChatStreamEvent::ContentDelta { .. } => {}
                            ChatStreamEvent::Done => {
                                state.done = true;
                            }
                        }
                    }
                }
                Some(Err(error)) => {
                    // Surface the failure, then terminate on the next poll.
                    state.done = true;
                    state.newline_emitted = true;
                    state.pending.push_back(Err(error));
                }
                None => {
                    // Stream ended without the sentinel; no synthetic newline.
                    state.done = true;
                    state.newline_emitted = true;
                }
            }
        }
    }))
}
