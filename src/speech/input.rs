//! Speech input session wrapping a recognition engine

use crate::integration::events::Event;
use crate::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// A speech-to-text engine, consumed as a black box
#[async_trait]
pub trait RecognitionEngine: Send {
    /// Resolves once the engine is loaded and usable
    async fn ready(&mut self) -> Result<()>;

    /// Ask for microphone access. Called before every start, never cached.
    async fn request_permission(&mut self) -> Result<()>;

    /// Begin recognizing; every utterance goes to `sink`
    fn start(&mut self, language: &str, sink: UtteranceSink) -> Result<()>;

    fn stop(&mut self);

    fn is_recognizing(&self) -> bool;
}

/// Callback handle an engine uses to report what it heard
#[derive(Debug, Clone)]
pub struct UtteranceSink {
    events: UnboundedSender<Event>,
    generation: u64,
}

impl UtteranceSink {
    pub fn new(events: UnboundedSender<Event>, generation: u64) -> Self {
        Self { events, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report one complete utterance. Returns false once the orchestrator is gone.
    pub fn deliver(&self, text: impl Into<String>) -> bool {
        self.events
            .send(Event::Utterance {
                generation: self.generation,
                text: text.into(),
            })
            .is_ok()
    }

    /// Recognition stopped on its own
    pub fn ended(&self) {
        let _ = self.events.send(Event::RecognitionEnded {
            generation: self.generation,
        });
    }

    pub fn failed(&self, message: impl Into<String>) {
        let _ = self.events.send(Event::RecognitionFailed {
            generation: self.generation,
            message: message.into(),
        });
    }
}

pub struct SpeechInputSession {
    engine: Box<dyn RecognitionEngine>,
    events: UnboundedSender<Event>,
    generation: u64,
    active: bool,
}

impl SpeechInputSession {
    pub fn new(engine: Box<dyn RecognitionEngine>, events: UnboundedSender<Event>) -> Self {
        Self {
            engine,
            events,
            generation: 0,
            active: false,
        }
    }

    pub async fn ready(&mut self) -> Result<()> {
        self.engine.ready().await
    }

    /// Obtain microphone permission, then start recognition in `language`.
    ///
    /// A denied permission leaves recognition stopped.
    pub async fn begin(&mut self, language: &str) -> Result<()> {
        self.end();
        self.engine.request_permission().await?;

        self.generation += 1;
        let sink = UtteranceSink::new(self.events.clone(), self.generation);
        self.engine.start(language, sink)?;
        self.active = true;
        info!("Recognition started ({}, generation {})", language, self.generation);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Generation of the most recent `begin`
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop recognition. Safe to call when already stopped.
    pub fn end(&mut self) {
        if self.active || self.engine.is_recognizing() {
            debug!("Recognition stopped (generation {})", self.generation);
            self.engine.stop();
        }
        self.active = false;
    }
}
