//! Incremental reply parser: turns one streamed model reply into one
//! dispatched command.
//!
//! A reply moves through three phases. The leading comment line is
//! accumulated and mirrored until its newline. The command line is then
//! tokenized on single spaces, with a newline completing the argument
//! list; the matched command starts on its own task at that moment.
//! Everything after the command line is forwarded to the running
//! command's body stream as it arrives. The parser makes progress on
//! every chunk regardless of how the stream is split, and only blocks on
//! the handler's result after the stream is fully consumed and the body
//! stream is closed.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use llm_provider::ReplyStream;
use tokio::sync::{mpsc, oneshot};

use crate::agent::commands::{BodyStream, CommandRegistry, Invocation};
use crate::agent::error::{AgentError, FixableError};
use crate::chat::ChatError;
use crate::console::{model_ps1, Console};

/// Body-channel depth; forwarding backpressures against a slow handler.
const BODY_CHANNEL_CAPACITY: usize = 16;

pub struct ReplyParser {
    registry: Arc<CommandRegistry>,
    console: Console,
    buf: Vec<u8>,
    comment: String,
    args: Vec<String>,
    args_done: bool,
    dispatch: Option<Dispatched>,
    transcript: String,
}

struct Dispatched {
    body_tx: Option<mpsc::Sender<Bytes>>,
    result_rx: oneshot::Receiver<Result<String, AgentError>>,
}

impl ReplyParser {
    #[must_use]
    pub fn new(registry: Arc<CommandRegistry>, console: Console) -> Self {
        Self {
            registry,
            console,
            buf: Vec::new(),
            comment: String::new(),
            args: Vec::new(),
            args_done: false,
            dispatch: None,
            transcript: String::new(),
        }
    }

    /// Drives one reply to completion.
    ///
    /// Returns the reply text consumed so far (for history recording) and
    /// either the dispatched command's result or the error that stopped
    /// the turn. An entirely empty reply yields an empty result.
    pub async fn handle(mut self, mut stream: ReplyStream) -> (String, Result<String, AgentError>) {
        let display = self.console.display();
        if let Err(error) = display.write_str(&model_ps1()) {
            return (self.transcript, Err(error.into()));
        }

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    return (
                        self.transcript,
                        Err(AgentError::Chat(ChatError::Completion(error))),
                    );
                }
            };

            self.transcript.push_str(&String::from_utf8_lossy(&chunk));
            self.buf.extend_from_slice(&chunk);
            if let Err(error) = self.consume(false).await {
                return (self.transcript, Err(error));
            }
        }

        if let Err(error) = self.consume(true).await {
            return (self.transcript, Err(error));
        }

        let Some(mut dispatched) = self.dispatch.take() else {
            return (self.transcript, Ok(String::new()));
        };

        // Close the body stream so the handler observes end-of-body, then
        // wait for its result.
        dispatched.body_tx.take();
        if let Err(error) = display.write_str("\n") {
            return (self.transcript, Err(error.into()));
        }

        match dispatched.result_rx.await {
            Ok(result) => (self.transcript, result),
            Err(_) => (
                self.transcript,
                Err(AgentError::Chat(ChatError::Internal(
                    "command task dropped its result".to_string(),
                ))),
            ),
        }
    }

    /// Advances the state machine over whatever is buffered. With
    /// `finalize` set, an unterminated trailing token is force-completed.
    async fn consume(&mut self, finalize: bool) -> Result<(), AgentError> {
        let display = self.console.display();

        while !self.args_done && !self.buf.is_empty() {
            if self.comment.is_empty() && self.buf[0] != b'#' {
                return Err(FixableError::Format(
                    String::from_utf8_lossy(&self.buf).into_owned(),
                )
                .into());
            }

            // Comment phase: consume up to the newline without tokenizing.
            if !self.comment.ends_with('\n') {
                let (part_len, newline) = match self.buf.iter().position(|&byte| byte == b'\n') {
                    Some(index) => (index + 1, true),
                    None => (self.buf.len(), false),
                };
                let part: Vec<u8> = self.buf.drain(..part_len).collect();
                display.write_bytes(&part)?;
                if newline {
                    display.write_str(&model_ps1())?;
                }
                self.comment.push_str(&String::from_utf8_lossy(&part));
                continue;
            }

            // Token phase: a space ends an argument, a newline ends the
            // argument list.
            let delimiter = self
                .buf
                .iter()
                .position(|&byte| byte == b'\n' || byte == b' ')
                .map(|index| (index, self.buf[index] == b'\n'));
            let token_end = match delimiter {
                Some((index, is_newline)) => {
                    self.args_done = is_newline;
                    index
                }
                None if finalize => {
                    self.args_done = true;
                    self.buf.len()
                }
                None => break,
            };

            let token = String::from_utf8_lossy(&self.buf[..token_end]).into_owned();
            self.args.push(token);
            let consumed_len = (token_end + 1).min(self.buf.len());
            let consumed: Vec<u8> = self.buf.drain(..consumed_len).collect();
            display.write_bytes(&consumed)?;
        }

        // The argument list just completed: look up and start the command.
        if self.dispatch.is_none() && self.args_done {
            let name = self.args.first().cloned().unwrap_or_default();
            let Some(spec) = self.registry.find(&name) else {
                return Err(FixableError::UnknownCommand(name).into());
            };

            let (body_tx, body) = if spec.accepts_body() {
                let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
                (Some(tx), BodyStream::from_receiver(rx))
            } else {
                (None, BodyStream::closed())
            };

            let invocation = Invocation {
                args: self.args[1..].to_vec(),
                body,
                console: self.console.clone(),
            };

            tracing::debug!(command = %name, args = self.args.len() - 1, "dispatching command");
            let (result_tx, result_rx) = oneshot::channel();
            let handler = spec.start(invocation);
            tokio::spawn(async move {
                let _ = result_tx.send(handler.await);
            });

            self.dispatch = Some(Dispatched { body_tx, result_rx });
        }

        // Body phase: everything after the argument line goes to the
        // dispatched command as it arrives.
        if self.args_done {
            let Some(dispatched) = &self.dispatch else {
                return Err(FixableError::Dispatch.into());
            };

            if !self.buf.is_empty() {
                let bytes = Bytes::from(std::mem::take(&mut self.buf));
                if let Some(tx) = &dispatched.body_tx {
                    // A handler that dropped its receiver simply ignores
                    // the rest of the body.
                    let _ = tx.send(bytes).await;
                }
            }
        }

        Ok(())
    }
}
