//! Mic state shared between the orchestrator and any UI
//!
//! The orchestrator is the only writer. UIs and tests read it synchronously.

use parking_lot::RwLock;
use std::sync::Arc;

/// Which subsystem currently owns the assistant
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MicState {
    /// Nothing running, waiting for the user
    #[default]
    Idle,
    /// Recognition active
    Listening,
    /// Completion request in flight
    Processing,
    /// Reply being spoken
    Speaking,
}

impl MicState {
    pub fn is_idle(&self) -> bool {
        matches!(self, MicState::Idle)
    }

    pub fn is_listening(&self) -> bool {
        matches!(self, MicState::Listening)
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, MicState::Processing)
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self, MicState::Speaking)
    }

    /// Check if in an active state (not idle)
    pub fn is_active(&self) -> bool {
        !self.is_idle()
    }
}

impl std::fmt::Display for MicState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MicState::Idle => write!(f, "Idle"),
            MicState::Listening => write!(f, "Listening"),
            MicState::Processing => write!(f, "Processing"),
            MicState::Speaking => write!(f, "Speaking"),
        }
    }
}

/// Thread-safe view of the current [`MicState`]
#[derive(Clone, Default)]
pub struct SharedMicState {
    inner: Arc<RwLock<MicState>>,
}

impl SharedMicState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> MicState {
        *self.inner.read()
    }

    pub(crate) fn set(&self, state: MicState) {
        *self.inner.write() = state;
    }

    pub fn is_idle(&self) -> bool {
        self.inner.read().is_idle()
    }
}
