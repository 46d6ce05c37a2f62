use std::io::{IsTerminal, Read};

use clap::Parser;
use gemini_api::{GeminiClient, GeminiConfig};
use llm_provider::{CompletionClient, Message, Role};
use openai_api::{OpenAiClient, OpenAiConfig};
use session_store::{default_root, SessionHeader, SessionStore};
use spool::chat::{Chat, ChatError};
use spool::cli::{is_gemini_model, Cli};
use spool::console::Console;
use spool::{agent, style};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(error) = run(cli).await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "spool=debug" } else { "spool=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), ChatError> {
    if cli.sessions {
        return list_sessions();
    }

    let model = cli.resolve_model();
    if cli.models {
        return list_models(&cli, &model).await;
    }

    let client = build_client(&cli, &model)?;
    let profile = client.profile();
    tracing::debug!(
        provider = %profile.provider_id,
        model = %profile.model_id,
        "completion client ready"
    );

    // Seed history from a stored session when resuming.
    let mut resume_header: Option<SessionHeader> = None;
    let mut seed: Vec<Message> = Vec::new();
    if let Some(session_id) = &cli.resume {
        let store = SessionStore::open(default_root()?)?;
        let stored = store.load(session_id)?;
        resume_header = Some(stored.header.clone());
        seed = stored.into_messages();
    }

    let (console, interactive) = build_console(&cli).await?;

    let resumed_with_system = seed
        .first()
        .is_some_and(|message| message.role == Role::System);
    let mut chat = Chat::new(client, console, seed, interactive);
    if cli.system.is_some() || !resumed_with_system {
        let system = cli
            .system
            .clone()
            .unwrap_or_else(|| default_system_prompt(&model));
        chat.set_system_prompt(system);
    }

    if cli.agent {
        agent::run(&mut chat).await?;
    } else {
        chat.run().await?;
    }

    if cli.save.is_some() || resume_header.is_some() {
        save_session(&cli, resume_header.as_ref(), &chat)?;
    }

    Ok(())
}

fn build_client(cli: &Cli, model: &str) -> Result<Box<dyn CompletionClient>, ChatError> {
    if is_gemini_model(model) {
        let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        let client = GeminiClient::new(GeminiConfig::new(api_key, model))
            .map_err(|error| ChatError::Completion(error.into()))?;
        return Ok(Box::new(client));
    }

    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    let mut config = OpenAiConfig::new(api_key, model);
    if let Some(effort) = &cli.effort {
        config = config.with_reasoning_effort(effort);
    }
    let client =
        OpenAiClient::new(config).map_err(|error| ChatError::Completion(error.into()))?;
    Ok(Box::new(client))
}

/// Chooses the prompt source: a prompt file or argument words first, then
/// the terminal (or piped stdin) for the rest of the session.
async fn build_console(cli: &Cli) -> Result<(Console, bool), ChatError> {
    let initial = if let Some(path) = &cli.prompt_file {
        let text = tokio::fs::read_to_string(path).await.map_err(|error| {
            ChatError::Internal(format!("open {}: {error}", path.display()))
        })?;
        Some(text)
    } else {
        cli.prompt_from_args()
    };

    if let Some(initial) = initial {
        if cli.interactive {
            return Ok((Console::interactive(Some(initial))?, true));
        }
        return Ok((Console::once(Some(initial)), false));
    }

    if std::io::stdin().is_terminal() {
        return Ok((Console::interactive(None)?, true));
    }

    let mut piped = String::new();
    std::io::stdin()
        .read_to_string(&mut piped)
        .map_err(|error| ChatError::Internal(format!("read stdin: {error}")))?;
    Ok((Console::once(Some(piped)), false))
}

fn default_system_prompt(model: &str) -> String {
    let started = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "an unknown time".to_string());

    let mut lines = vec![
        "You are a helpful AI assistant reached through a command-line chat tool.".to_string(),
        format!("Your underlying model is: {model}."),
        format!("The chat session started at {started} (UTC)."),
        format!(
            "The host OS is {} ({}).",
            std::env::consts::OS,
            std::env::consts::ARCH
        ),
    ];

    if cfg!(target_os = "linux") {
        if let Ok(release) = std::fs::read_to_string("/etc/os-release") {
            if let Some(name) = release
                .lines()
                .find_map(|line| line.strip_prefix("PRETTY_NAME="))
            {
                lines.push(format!(
                    "The host Linux distribution is {}.",
                    name.trim_matches('"')
                ));
            }
        }
    }

    lines.join("\n")
}

async fn list_models(cli: &Cli, model: &str) -> Result<(), ChatError> {
    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    let mut config = OpenAiConfig::new(api_key, model);
    if let Some(effort) = &cli.effort {
        config = config.with_reasoning_effort(effort);
    }
    let client =
        OpenAiClient::new(config).map_err(|error| ChatError::Completion(error.into()))?;

    let ids = client
        .list_models()
        .await
        .map_err(|error| ChatError::Completion(error.into()))?;
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn list_sessions() -> Result<(), ChatError> {
    let store = SessionStore::open(default_root()?)?;
    for header in store.list()? {
        println!(
            "{}  {}  (updated {})",
            header.session_id, header.name, header.updated_at
        );
    }
    Ok(())
}

fn save_session(
    cli: &Cli,
    resume_header: Option<&SessionHeader>,
    chat: &Chat,
) -> Result<(), ChatError> {
    let store = SessionStore::open(default_root()?)?;
    let name = cli
        .save
        .clone()
        .or_else(|| resume_header.map(|header| header.name.clone()))
        .unwrap_or_else(|| "unnamed".to_string());
    let session_id = resume_header.map(|header| header.session_id.as_str());

    let header = store.save(session_id, &name, chat.messages())?;
    tracing::debug!(session_id = %header.session_id, "saved session");
    chat.console.display().write_str(&format!(
        "{}saved session {}{}\n",
        style::esc(&[92]),
        header.session_id,
        style::reset()
    ))?;
    Ok(())
}
