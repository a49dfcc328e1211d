//! User interface boundary
//!
//! The orchestrator pushes everything the user should see through [`UiSink`].
//! User actions travel the other way as `AppCommand`s on the orchestrator handle.

pub mod console;

pub use console::ConsoleUi;

use crate::integration::state::MicState;
use crate::messages::Message;

pub trait UiSink: Send + Sync {
    /// Mic affordance changed
    fn render_state(&self, state: MicState);

    /// A message was added to the transcript
    fn render_message(&self, message: &Message);

    fn render_error(&self, error: &str);

    /// Transient status line (throttling, retries, selections)
    fn render_notice(&self, notice: &str);

    fn transcript_cleared(&self);

    /// Open `url` in a new browsing context. Returns false if that failed.
    fn open_link(&self, url: &str) -> bool;
}
