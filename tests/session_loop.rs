//! Agent session-loop behavior with a scripted completion source: error
//! feedback re-injection and turn-to-turn state.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use llm_provider::{
    CompletionClient, CompletionError, Message, ProviderProfile, ReplyStream, Role,
};
use spool::agent;
use spool::chat::Chat;
use spool::console::{Console, Display};

/// Serves canned replies in order, one per completion request.
struct ScriptedClient {
    replies: Mutex<VecDeque<Vec<String>>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Vec<&str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|chunks| chunks.into_iter().map(String::from).collect())
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: "scripted".to_string(),
            model_id: "scripted-model".to_string(),
        }
    }

    async fn complete(&self, _messages: &[Message]) -> Result<ReplyStream, CompletionError> {
        let chunks = self
            .replies
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_default();
        Ok(Box::pin(futures_util::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<Bytes, CompletionError>(Bytes::from(chunk))),
        )))
    }
}

fn scripted_chat(replies: Vec<Vec<&str>>, console_lines: Vec<&str>) -> Chat {
    let console = Console::scripted(
        console_lines.into_iter().map(String::from).collect(),
        Display::buffer(),
    );
    Chat::new(
        Box::new(ScriptedClient::new(replies)),
        console,
        vec![Message::system("test system prompt")],
        true,
    )
}

fn write_fixture(dir: &tempfile::TempDir, contents: &str) -> String {
    let path = dir.path().join("fixture.txt");
    let mut file = std::fs::File::create(&path).expect("fixture created");
    write!(file, "{contents}").expect("fixture written");
    path.display().to_string()
}

/// The user message following a given model reply, i.e. the input the
/// next turn was driven with.
fn input_after_reply<'a>(messages: &'a [Message], reply: &str) -> Option<&'a str> {
    let index = messages
        .iter()
        .position(|message| message.role == Role::Model && message.content == reply)?;
    messages[index + 1..]
        .iter()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.as_str())
}

#[tokio::test]
async fn recoverable_error_feedback_then_correction_matches_direct_dispatch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(&dir, "file-contents");
    let corrected = format!("# read the fixture\ncat {path}\n");

    // First session: a malformed reply, then the corrected one.
    let mut with_error = scripted_chat(
        vec![
            vec!["cat with no comment\n"],
            vec![corrected.as_str()],
            vec!["# hand control back\nprompt\n"],
        ],
        vec![],
    );
    agent::run(&mut with_error).await.expect("loop exits cleanly");

    // Second session: the corrected reply sent first.
    let mut direct = scripted_chat(
        vec![
            vec![corrected.as_str()],
            vec!["# hand control back\nprompt\n"],
        ],
        vec![],
    );
    agent::run(&mut direct).await.expect("loop exits cleanly");

    let recovered_result = input_after_reply(with_error.messages(), &corrected)
        .expect("corrected reply produced a result");
    let direct_result =
        input_after_reply(direct.messages(), &corrected).expect("reply produced a result");

    assert_eq!(recovered_result, "file-contents");
    assert_eq!(recovered_result, direct_result);
}

#[tokio::test]
async fn malformed_reply_feeds_hint_back_as_next_input() {
    let mut chat = scripted_chat(
        vec![
            vec!["no comment here\n"],
            vec!["# done\nprompt\n"],
        ],
        vec![],
    );
    agent::run(&mut chat).await.expect("loop exits cleanly");

    let feedback = chat
        .messages()
        .iter()
        .filter(|message| message.role == Role::User)
        .map(|message| message.content.as_str())
        .find(|content| content.contains("unexpected input"))
        .expect("feedback became a user message");
    assert!(feedback.contains("# "), "feedback carries a hinted comment");
}

#[tokio::test]
async fn command_results_become_the_next_turn_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(&dir, "alpha");
    let read_reply = format!("# read it\ncat {path}\n");

    let mut chat = scripted_chat(
        vec![
            vec![read_reply.as_str()],
            vec!["# all done\nprompt\n"],
        ],
        vec![],
    );
    agent::run(&mut chat).await.expect("loop exits cleanly");

    assert_eq!(
        input_after_reply(chat.messages(), &read_reply),
        Some("alpha")
    );
}

#[tokio::test]
async fn prompt_command_returns_user_input_verbatim() {
    let mut chat = scripted_chat(
        vec![
            vec!["# ask the user\nprompt\n"],
            vec!["# ask again\nprompt\n"],
        ],
        vec!["do the thing"],
    );
    agent::run(&mut chat).await.expect("loop exits cleanly");

    assert_eq!(
        input_after_reply(chat.messages(), "# ask the user\nprompt\n"),
        Some("do the thing")
    );
}

#[tokio::test]
async fn agent_system_prompt_lists_commands() {
    let mut chat = scripted_chat(vec![vec!["# done\nprompt\n"]], vec![]);
    agent::run(&mut chat).await.expect("loop exits cleanly");

    let system = chat
        .messages()
        .first()
        .expect("system message present");
    assert_eq!(system.role, Role::System);
    for name in ["prompt", "cat", "ls", "write", "curl"] {
        assert!(
            system.content.contains(&format!("- command: {name}")),
            "system prompt lists {name}"
        );
    }
}
