//! Commands and events consumed by the orchestrator loop
//!
//! Every asynchronous resolution carries the tag of the mode that started it
//! (listen generation, turn id or utterance id) so the loop can drop results
//! that arrive after that mode has been left.

use crate::llm::{CompletionError, CompletionNotice, Provider};

/// User actions sent from the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Mic button: start listening when idle, stop whatever is active otherwise
    MicPressed,

    /// Typed input
    TextSubmitted(String),

    /// Switch the active completion provider
    ProviderSelected(Provider),

    /// Switch recognition and synthesis language (BCP 47 tag)
    LanguageSelected(String),

    /// Erase the transcript
    ClearRequested,

    /// Stop the orchestrator loop
    Shutdown,
}

/// Lifecycle of a single synthesized utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    Started,
    Ended,
    Failed(String),
}

/// Everything the orchestrator loop reacts to
#[derive(Debug, Clone)]
pub enum Event {
    Command(AppCommand),

    /// One recognized utterance
    Utterance { generation: u64, text: String },

    /// Recognition stopped by itself (silence, engine timeout)
    RecognitionEnded { generation: u64 },

    RecognitionFailed { generation: u64, message: String },

    Synthesis { utterance: u64, event: SynthesisEvent },

    AutoStopElapsed { generation: u64 },

    CompletionNotice { turn: u64, notice: CompletionNotice },

    CompletionResolved {
        turn: u64,
        result: Result<String, CompletionError>,
    },
}

impl From<AppCommand> for Event {
    fn from(command: AppCommand) -> Self {
        Event::Command(command)
    }
}
