//! Line-oriented terminal UI

use super::UiSink;
use crate::integration::state::MicState;
use crate::messages::{Message, Sender};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct ConsoleUi;

impl ConsoleUi {
    pub fn new() -> Self {
        Self
    }
}

fn state_label(state: MicState) -> &'static str {
    match state {
        MicState::Idle => "🎤 Press /mic to talk or type a question",
        MicState::Listening => "👂 Listening...",
        MicState::Processing => "🤔 Thinking...",
        MicState::Speaking => "🗣  Speaking... (/mic to stop)",
    }
}

#[cfg(target_os = "macos")]
fn opener(url: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(url);
    command
}

#[cfg(target_os = "windows")]
fn opener(url: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", "", url]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener(url: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(url);
    command
}

/// Start `command` detached from the terminal and reap it once it exits
fn launch(mut command: Command) -> std::io::Result<thread::JoinHandle<()>> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(thread::spawn(move || {
        if let Err(e) = child.wait() {
            warn!("Link opener did not exit cleanly: {}", e);
        }
    }))
}

impl UiSink for ConsoleUi {
    fn render_state(&self, state: MicState) {
        println!("[{}] {}", state, state_label(state));
    }

    fn render_message(&self, message: &Message) {
        match message.sender {
            Sender::System => println!("  ({})", message.body),
            _ => println!("{}", message),
        }
    }

    fn render_error(&self, error: &str) {
        eprintln!("⚠ {}", error);
    }

    fn render_notice(&self, notice: &str) {
        println!("⏳ {}", notice);
    }

    fn transcript_cleared(&self) {
        println!("Conversation cleared.");
    }

    fn open_link(&self, url: &str) -> bool {
        debug!("Opening {}", url);
        if let Err(e) = launch(opener(url)) {
            warn!("Failed to open {}: {}", url, e);
            return false;
        }
        true
    }
}
