//! Integration layer for the complete voice assistant
//!
//! This module ties together speech input, chat completion, the transcript
//! and speech output into one turn cycle driven by the [`Orchestrator`].

pub mod config;
pub mod events;
pub mod fallback;
pub mod filter;
pub mod orchestrator;
pub mod session;
pub mod state;

pub use config::{AssistantConfig, AutoStopConfig, ProviderOverrides};
pub use events::{AppCommand, Event, SynthesisEvent};
pub use fallback::{Fallback, FallbackResponder};
pub use filter::is_noise;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorHandle};
pub use session::Session;
pub use state::{MicState, SharedMicState};
