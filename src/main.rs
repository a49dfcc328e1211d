use anyhow::Result;
use jarvis::credentials::{ChainedCredentials, EnvCredentials, StaticCredentials};
use jarvis::integration::{AssistantConfig, Orchestrator, OrchestratorHandle};
use jarvis::llm::Provider;
use jarvis::persistence::{FileStore, KeyValueStore, MemoryStore};
use jarvis::speech::{ConsoleMicrophone, ConsoleRecognition, ConsoleSynthesis};
use jarvis::ui::ConsoleUi;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "Commands: /mic (start or stop listening), /provider <gemini|openai|deepseek>, \
/lang <tag>, /clear, /quit. Other lines are heard while listening, typed otherwise.";

/// One line of terminal input
#[derive(Debug, PartialEq, Eq)]
enum ConsoleInput {
    Mic,
    Provider(String),
    Language(String),
    Clear,
    Help,
    Quit,
    Text(String),
}

fn parse_line(line: &str) -> Option<ConsoleInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(ConsoleInput::Text(line.to_string()));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim().to_string()),
        None => (command, String::new()),
    };
    Some(match name {
        "mic" => ConsoleInput::Mic,
        "provider" => ConsoleInput::Provider(arg),
        "lang" => ConsoleInput::Language(arg),
        "clear" => ConsoleInput::Clear,
        "quit" | "exit" => ConsoleInput::Quit,
        _ => ConsoleInput::Help,
    })
}

fn load_config() -> Result<AssistantConfig> {
    if let Some(path) = std::env::args().nth(1) {
        info!("Loading configuration from {}", path);
        return Ok(AssistantConfig::load(path)?);
    }
    match AssistantConfig::default_path() {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            Ok(AssistantConfig::load(path)?)
        }
        _ => Ok(AssistantConfig::default()),
    }
}

fn open_store() -> Arc<dyn KeyValueStore> {
    match FileStore::default_location().map(FileStore::open) {
        Some(Ok(store)) => {
            info!("Persisting to {}", store.root().display());
            Arc::new(store)
        }
        Some(Err(e)) => {
            warn!("History will not be saved: {}", e);
            Arc::new(MemoryStore::new())
        }
        None => {
            warn!("No data directory, history will not be saved");
            Arc::new(MemoryStore::new())
        }
    }
}

fn forward(input: ConsoleInput, handle: &OrchestratorHandle, microphone: &ConsoleMicrophone) -> Result<bool> {
    match input {
        ConsoleInput::Mic => handle.mic_pressed()?,
        ConsoleInput::Provider(name) => match name.parse::<Provider>() {
            Ok(provider) => handle.select_provider(provider)?,
            Err(e) => eprintln!("{}", e),
        },
        ConsoleInput::Language(tag) => handle.select_language(tag)?,
        ConsoleInput::Clear => handle.clear()?,
        ConsoleInput::Help => println!("{}", HELP),
        ConsoleInput::Quit => return Ok(false),
        ConsoleInput::Text(text) => {
            if !microphone.hear(&text) {
                handle.submit_text(text)?;
            }
        }
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jarvis=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Jarvis voice assistant");

    let config = load_config()?;
    let credentials = ChainedCredentials::new()
        .with_source(EnvCredentials)
        .with_source(StaticCredentials::from_dotenv_file(Path::new(".env")));
    let microphone = ConsoleMicrophone::new();

    let (orchestrator, handle) = Orchestrator::builder(config)
        .with_recognition(ConsoleRecognition::new(microphone.clone()))
        .with_synthesis(ConsoleSynthesis::new())
        .with_ui(Arc::new(ConsoleUi::new()))
        .with_store(open_store())
        .with_credentials(credentials)
        .build()?;
    let runner = tokio::spawn(orchestrator.run());

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(input) = parse_line(&line) else {
            continue;
        };
        if !forward(input, &handle, &microphone)? {
            break;
        }
    }

    handle.shutdown()?;
    runner.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("/mic"), Some(ConsoleInput::Mic));
        assert_eq!(
            parse_line("/provider  deepseek "),
            Some(ConsoleInput::Provider("deepseek".to_string()))
        );
        assert_eq!(
            parse_line("/lang fr-FR"),
            Some(ConsoleInput::Language("fr-FR".to_string()))
        );
        assert_eq!(parse_line("/clear"), Some(ConsoleInput::Clear));
        assert_eq!(parse_line("/exit"), Some(ConsoleInput::Quit));
        assert_eq!(parse_line("/whatever"), Some(ConsoleInput::Help));
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(parse_line("   "), None);
        assert_eq!(
            parse_line(" open GitHub "),
            Some(ConsoleInput::Text("open GitHub".to_string()))
        );
    }
}
