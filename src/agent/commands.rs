//! The command registry and its built-in capability handlers.

use std::process::Stdio;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use crate::agent::error::{AgentError, FixableError};
use crate::console::Console;

const SHELL_FAILURE_HINT: &str =
    "The command failed. Try something else, or ask for directions with the prompt command.";

/// Readable body stream handed to a dispatched command. Always present;
/// immediately closed for commands that take no body.
pub struct BodyStream {
    rx: Option<mpsc::Receiver<Bytes>>,
}

impl BodyStream {
    pub(crate) fn from_receiver(rx: mpsc::Receiver<Bytes>) -> Self {
        Self { rx: Some(rx) }
    }

    #[must_use]
    pub fn closed() -> Self {
        Self { rx: None }
    }

    /// Next chunk of body bytes, or `None` once the body is complete.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Drains the whole body into memory.
    pub async fn read_to_end(&mut self) -> Vec<u8> {
        let mut contents = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            contents.extend_from_slice(&chunk);
        }
        contents
    }
}

/// One command dispatch: parsed arguments (command name excluded), the
/// live body stream, and the console services handlers may use.
pub struct Invocation {
    pub args: Vec<String>,
    pub body: BodyStream,
    pub console: Console,
}

pub type HandlerFuture = BoxFuture<'static, Result<String, AgentError>>;

type Handler = Arc<dyn Fn(Invocation) -> HandlerFuture + Send + Sync>;

/// Immutable description of one capability, fixed at registry build time.
pub struct CommandSpec {
    name: String,
    args_hint: String,
    description: String,
    accepts_body: bool,
    run: Handler,
}

impl CommandSpec {
    pub fn new(
        name: impl Into<String>,
        args_hint: impl Into<String>,
        description: impl Into<String>,
        accepts_body: bool,
        run: impl Fn(Invocation) -> HandlerFuture + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            args_hint: args_hint.into(),
            description: description.into(),
            accepts_body,
            run: Arc::new(run),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn args_hint(&self) -> &str {
        &self.args_hint
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn accepts_body(&self) -> bool {
        self.accepts_body
    }

    pub(crate) fn start(&self, invocation: Invocation) -> HandlerFuture {
        (self.run)(invocation)
    }
}

/// Ordered command table, constructed once and passed into the parser and
/// session loop. First exact name match wins.
pub struct CommandRegistry {
    specs: Vec<CommandSpec>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new(specs: Vec<CommandSpec>) -> Self {
        Self { specs }
    }

    /// The built-in capability set.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(vec![
            CommandSpec::new(
                "prompt",
                "",
                "Asks the user for the next prompt and returns their answer.",
                false,
                |invocation| Box::pin(run_prompt(invocation)),
            ),
            CommandSpec::new(
                "cat",
                "FILES ...",
                "Returns the concatenated contents of one or more files.",
                false,
                |invocation| Box::pin(run_cat(invocation)),
            ),
            CommandSpec::new(
                "ls",
                "PATH ...",
                "Runs a long-format directory listing on the given paths and returns the result.",
                false,
                |invocation| Box::pin(run_ls(invocation)),
            ),
            CommandSpec::new(
                "write",
                "PATH",
                "Writes a file. For this command only, every line after the command line is written to the file.",
                true,
                |invocation| Box::pin(run_write(invocation)),
            ),
            CommandSpec::new(
                "curl",
                "URL",
                "Issues an HTTP GET request. The result is the status line, a blank line, then the response body.",
                false,
                |invocation| Box::pin(run_curl(invocation)),
            ),
        ])
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&CommandSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    /// Command list rendered into the agent system prompt.
    #[must_use]
    pub fn catalog(&self) -> String {
        let mut rendered = String::new();
        for spec in &self.specs {
            rendered.push_str("- command: ");
            rendered.push_str(&spec.name);
            if !spec.args_hint.is_empty() {
                rendered.push(' ');
                rendered.push_str(&spec.args_hint);
            }
            rendered.push_str("\n  description: ");
            rendered.push_str(&spec.description);
            rendered.push('\n');
        }
        rendered
    }
}

async fn run_prompt(invocation: Invocation) -> Result<String, AgentError> {
    invocation
        .console
        .read_prompt()
        .await
        .map_err(AgentError::Chat)
}

async fn run_cat(invocation: Invocation) -> Result<String, AgentError> {
    combined_output("cat", &[], &invocation.args).await
}

async fn run_ls(invocation: Invocation) -> Result<String, AgentError> {
    combined_output("ls", &["-la"], &invocation.args).await
}

/// Runs an external command with stdin closed and returns stdout followed
/// by stderr. A spawn failure or non-zero exit is recoverable.
async fn combined_output(
    program: &str,
    flags: &[&str],
    args: &[String],
) -> Result<String, AgentError> {
    let output = tokio::process::Command::new(program)
        .args(flags)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|error| {
            FixableError::failed(format!("{program}: {error}"), SHELL_FAILURE_HINT)
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(FixableError::failed(text, SHELL_FAILURE_HINT).into());
    }

    Ok(text)
}

async fn run_write(mut invocation: Invocation) -> Result<String, AgentError> {
    if invocation.args.len() != 1 {
        return Err(FixableError::argument(
            format!("expected exactly one path, got {}", invocation.args.len()),
            "The write command accepts a single filename argument. File contents go on the lines after the command line, not in the argument list.",
        )
        .into());
    }
    let path = invocation.args[0].clone();

    // Echo the body as it is consumed so the user sees exactly what would
    // be written before being asked to approve it.
    let display = invocation.console.display();
    let mut contents = Vec::new();
    while let Some(chunk) = invocation.body.next_chunk().await {
        display.write_bytes(&chunk)?;
        contents.extend_from_slice(&chunk);
    }

    tracing::debug!(path = %path, bytes = contents.len(), "write body complete, confirming");
    let confirmation = invocation
        .console
        .confirm(&format!("Write the above contents to {path:?}?"))
        .await
        .map_err(AgentError::Chat)?;
    if !confirmation.approved {
        return Err(FixableError::PermissionDenied {
            reply: confirmation.reply,
        }
        .into());
    }

    tokio::fs::write(&path, &contents).await.map_err(|error| {
        FixableError::failed(
            format!("write {path}: {error}"),
            "The file failed to write.",
        )
    })?;

    Ok(String::new())
}

async fn run_curl(invocation: Invocation) -> Result<String, AgentError> {
    if invocation.args.len() != 1 {
        return Err(FixableError::argument(
            format!("expected exactly one URL, got {}", invocation.args.len()),
            "Example: curl https://example.com/search?q=Hello",
        )
        .into());
    }
    let url = &invocation.args[0];

    let response = reqwest::get(url).await.map_err(|error| {
        FixableError::failed(
            format!("GET {url}: {error}"),
            "The request failed. Check the URL, or try a different one.",
        )
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|error| {
        FixableError::failed(
            format!("failed to read response body: {error}"),
            "This could be a transient error. Consider retrying.",
        )
    })?;

    Ok(format!("{status}\n\n{body}"))
}
