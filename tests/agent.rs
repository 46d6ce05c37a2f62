//! Reply-interpreter behavior: phase handling, dispatch, and the built-in
//! command contracts.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use llm_provider::{CompletionError, ReplyStream};
use spool::agent::commands::{CommandRegistry, CommandSpec};
use spool::agent::error::{AgentError, FixableError};
use spool::agent::parser::ReplyParser;
use spool::console::{model_ps1, Console, Display};

fn reply_stream(chunks: Vec<String>) -> ReplyStream {
    Box::pin(futures_util::stream::iter(
        chunks
            .into_iter()
            .map(|chunk| Ok::<Bytes, CompletionError>(Bytes::from(chunk))),
    ))
}

fn single_chunk(reply: &str) -> ReplyStream {
    reply_stream(vec![reply.to_string()])
}

fn byte_chunks(reply: &str) -> ReplyStream {
    reply_stream(reply.chars().map(String::from).collect())
}

type CapturedCalls = Arc<Mutex<Vec<(Vec<String>, Vec<u8>)>>>;

/// A registry with a single body-accepting command that records its
/// invocation, so dispatch can be observed without touching the host.
fn capture_registry(calls: CapturedCalls) -> Arc<CommandRegistry> {
    Arc::new(CommandRegistry::new(vec![CommandSpec::new(
        "echo",
        "ARGS ...",
        "Records its arguments and body.",
        true,
        move |mut invocation| {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                let body = invocation.body.read_to_end().await;
                calls
                    .lock()
                    .expect("capture lock")
                    .push((invocation.args.clone(), body));
                Ok("captured".to_string())
            })
        },
    )]))
}

fn scripted_console(lines: Vec<&str>) -> Console {
    Console::scripted(
        lines.into_iter().map(String::from).collect(),
        Display::buffer(),
    )
}

#[tokio::test]
async fn well_formed_reply_dispatches_command_args_and_body() {
    let calls: CapturedCalls = Arc::default();
    let parser = ReplyParser::new(capture_registry(Arc::clone(&calls)), scripted_console(vec![]));

    let (transcript, result) = parser
        .handle(single_chunk("# run the capture\necho one two\nbody bytes"))
        .await;

    assert_eq!(result.expect("dispatch succeeds"), "captured");
    assert_eq!(transcript, "# run the capture\necho one two\nbody bytes");

    let calls = calls.lock().expect("capture lock");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, vec!["one".to_string(), "two".to_string()]);
    assert_eq!(calls[0].1, b"body bytes".to_vec());
}

#[tokio::test]
async fn one_byte_chunks_and_single_chunk_dispatch_identically() {
    let reply = "# split test\necho alpha beta\npayload";

    let single_calls: CapturedCalls = Arc::default();
    let single_console = scripted_console(vec![]);
    let single_display = single_console.display();
    let (single_transcript, single_result) =
        ReplyParser::new(capture_registry(Arc::clone(&single_calls)), single_console)
            .handle(single_chunk(reply))
            .await;

    let bytewise_calls: CapturedCalls = Arc::default();
    let bytewise_console = scripted_console(vec![]);
    let bytewise_display = bytewise_console.display();
    let (bytewise_transcript, bytewise_result) =
        ReplyParser::new(capture_registry(Arc::clone(&bytewise_calls)), bytewise_console)
            .handle(byte_chunks(reply))
            .await;

    assert_eq!(
        single_result.expect("single chunk dispatches"),
        bytewise_result.expect("byte chunks dispatch")
    );
    assert_eq!(single_transcript, bytewise_transcript);
    assert_eq!(
        *single_calls.lock().expect("capture lock"),
        *bytewise_calls.lock().expect("capture lock")
    );
    assert_eq!(single_display.captured(), bytewise_display.captured());
}

#[tokio::test]
async fn reply_without_leading_comment_fails_without_dispatch() {
    let calls: CapturedCalls = Arc::default();
    let parser = ReplyParser::new(capture_registry(Arc::clone(&calls)), scripted_console(vec![]));

    let (_, result) = parser.handle(single_chunk("echo no comment\n")).await;

    assert!(matches!(
        result,
        Err(AgentError::Fixable(FixableError::Format(_)))
    ));
    assert!(calls.lock().expect("capture lock").is_empty());
}

#[tokio::test]
async fn unknown_command_is_a_recoverable_error() {
    let parser = ReplyParser::new(
        Arc::new(CommandRegistry::builtin()),
        scripted_console(vec![]),
    );

    let (_, result) = parser.handle(single_chunk("# try this\nfrobnicate now\n")).await;

    let Err(AgentError::Fixable(error @ FixableError::UnknownCommand(_))) = result else {
        panic!("expected an unknown-command error");
    };
    assert!(error.feedback().contains("prompt"));
}

#[tokio::test]
async fn empty_reply_dispatches_nothing_and_yields_empty_result() {
    let calls: CapturedCalls = Arc::default();
    let parser = ReplyParser::new(capture_registry(Arc::clone(&calls)), scripted_console(vec![]));

    let (transcript, result) = parser.handle(reply_stream(vec![])).await;

    assert_eq!(result.expect("empty reply is not an error"), "");
    assert_eq!(transcript, "");
    assert!(calls.lock().expect("capture lock").is_empty());
}

#[tokio::test]
async fn stream_end_force_completes_the_final_token() {
    let calls: CapturedCalls = Arc::default();
    let parser = ReplyParser::new(capture_registry(Arc::clone(&calls)), scripted_console(vec![]));

    // No trailing newline after the argument list.
    let (_, result) = parser.handle(single_chunk("# truncated\necho tail")).await;

    assert_eq!(result.expect("dispatch succeeds"), "captured");
    let calls = calls.lock().expect("capture lock");
    assert_eq!(calls[0].0, vec!["tail".to_string()]);
    assert!(calls[0].1.is_empty());
}

#[tokio::test]
async fn comment_and_command_line_are_mirrored_in_order() {
    let calls: CapturedCalls = Arc::default();
    let console = scripted_console(vec![]);
    let display = console.display();
    let parser = ReplyParser::new(capture_registry(Arc::clone(&calls)), console);

    let (_, result) = parser
        .handle(single_chunk("# mirror me\necho a\nhidden body"))
        .await;
    result.expect("dispatch succeeds");

    let ps1 = model_ps1();
    let expected = format!("{ps1}# mirror me\n{ps1}echo a\n\n");
    assert_eq!(String::from_utf8_lossy(&display.captured()), expected);
}

mod write_command {
    use super::*;

    fn builtin() -> Arc<CommandRegistry> {
        Arc::new(CommandRegistry::builtin())
    }

    #[tokio::test]
    async fn two_path_arguments_fail_before_any_confirmation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");

        // No scripted confirmation reply: reaching the prompt would fail
        // the test with an end-of-input error instead of ArgumentError.
        let parser = ReplyParser::new(builtin(), scripted_console(vec![]));
        let reply = format!(
            "# write twice\nwrite {} {}\nhello",
            first.display(),
            second.display()
        );
        let (_, result) = parser.handle(single_chunk(&reply)).await;

        assert!(matches!(
            result,
            Err(AgentError::Fixable(FixableError::Argument { .. }))
        ));
        assert!(!first.exists());
        assert!(!second.exists());
    }

    #[tokio::test]
    async fn denial_preserves_the_reply_and_leaves_the_filesystem_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("denied.txt");

        let parser = ReplyParser::new(builtin(), scripted_console(vec!["no, typo"]));
        let reply = format!("# write it\nwrite {}\nhello", target.display());
        let (_, result) = parser.handle(single_chunk(&reply)).await;

        let Err(AgentError::Fixable(error @ FixableError::PermissionDenied { .. })) = result
        else {
            panic!("expected permission denial");
        };
        assert!(error.hint().contains("no, typo"));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn approval_writes_exactly_the_body_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("approved.txt");

        let console = scripted_console(vec!["yes"]);
        let display = console.display();
        let parser = ReplyParser::new(builtin(), console);
        let reply = format!("# write it\nwrite {}\nhello", target.display());
        let (_, result) = parser.handle(single_chunk(&reply)).await;

        assert_eq!(result.expect("write succeeds"), "");
        assert_eq!(std::fs::read(&target).expect("file readable"), b"hello");

        // The body is echoed before the confirmation question.
        let shown = String::from_utf8_lossy(&display.captured()).into_owned();
        assert!(shown.contains("hello"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&target)
                .expect("metadata readable")
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0, "written file must not be executable");
        }
    }
}

mod curl_command {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn wrong_argument_counts_are_argument_errors() {
        for reply in ["# get\ncurl\n", "# get\ncurl http://a http://b\n"] {
            let parser = ReplyParser::new(
                Arc::new(CommandRegistry::builtin()),
                scripted_console(vec![]),
            );
            let (_, result) = parser.handle(single_chunk(reply)).await;
            assert!(
                matches!(
                    result,
                    Err(AgentError::Fixable(FixableError::Argument { .. }))
                ),
                "reply {reply:?} should fail argument validation"
            );
        }
    }

    #[tokio::test]
    async fn result_is_status_line_blank_line_then_body() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener binds");
        let address = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("connection accepted");
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\nconnection: close\r\n\r\nhello",
                )
                .await
                .expect("response written");
        });

        let parser = ReplyParser::new(
            Arc::new(CommandRegistry::builtin()),
            scripted_console(vec![]),
        );
        let reply = format!("# fetch\ncurl http://{address}/\n");
        let (_, result) = parser.handle(single_chunk(&reply)).await;

        let output = result.expect("request succeeds");
        assert!(output.starts_with("200 OK\n\n"), "got {output:?}");
        assert!(output.ends_with("hello"));
    }
}
