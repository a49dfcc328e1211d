//! Speech output session wrapping a synthesis engine

use crate::integration::events::{Event, SynthesisEvent};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Voice parameters applied to every utterance
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Speaking rate (1.0 = engine default)
    pub rate: f32,

    pub pitch: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: 0.8,
            pitch: 1.0,
        }
    }
}

/// One piece of text handed to the synthesis engine
#[derive(Clone, Debug, PartialEq)]
pub struct Utterance {
    pub id: u64,
    pub text: String,
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
}

/// A text-to-speech engine, consumed as a black box
#[async_trait]
pub trait SynthesisEngine: Send {
    async fn ready(&mut self) -> Result<()>;

    /// Start speaking; lifecycle events go to `sink`
    fn speak(&mut self, utterance: Utterance, sink: SynthesisSink) -> Result<()>;

    /// Cancel the current utterance, if any
    fn cancel(&mut self);

    fn is_speaking(&self) -> bool;
}

/// Callback handle an engine uses to report utterance lifecycle
#[derive(Debug, Clone)]
pub struct SynthesisSink {
    events: UnboundedSender<Event>,
    utterance: u64,
}

impl SynthesisSink {
    pub fn new(events: UnboundedSender<Event>, utterance: u64) -> Self {
        Self { events, utterance }
    }

    pub fn utterance(&self) -> u64 {
        self.utterance
    }

    pub fn started(&self) {
        self.send(SynthesisEvent::Started);
    }

    pub fn ended(&self) {
        self.send(SynthesisEvent::Ended);
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.send(SynthesisEvent::Failed(message.into()));
    }

    fn send(&self, event: SynthesisEvent) {
        let _ = self.events.send(Event::Synthesis {
            utterance: self.utterance,
            event,
        });
    }
}

pub struct SpeechOutputSession {
    engine: Box<dyn SynthesisEngine>,
    events: UnboundedSender<Event>,
    voice: VoiceSettings,
    next_id: u64,
    current: Option<u64>,
}

impl SpeechOutputSession {
    pub fn new(
        engine: Box<dyn SynthesisEngine>,
        events: UnboundedSender<Event>,
        voice: VoiceSettings,
    ) -> Self {
        Self {
            engine,
            events,
            voice,
            next_id: 0,
            current: None,
        }
    }

    pub async fn ready(&mut self) -> Result<()> {
        self.engine.ready().await
    }

    /// Speak `text`, cancelling whatever is being spoken first
    pub fn speak(&mut self, text: &str, language: &str) -> Result<u64> {
        self.stop();

        self.next_id += 1;
        let id = self.next_id;
        let utterance = Utterance {
            id,
            text: text.to_string(),
            language: language.to_string(),
            rate: self.voice.rate,
            pitch: self.voice.pitch,
        };

        debug!("Speaking utterance {} ({} chars)", id, text.len());
        self.engine
            .speak(utterance, SynthesisSink::new(self.events.clone(), id))?;
        self.current = Some(id);
        Ok(id)
    }

    /// Cancel immediately. Safe to call when nothing is playing.
    pub fn stop(&mut self) {
        if self.current.take().is_some() || self.engine.is_speaking() {
            debug!("Synthesis cancelled");
            self.engine.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_utterance(&self) -> Option<u64> {
        self.current
    }

    /// Mark utterance `id` as finished. Returns false if it is no longer current.
    pub fn finish(&mut self, id: u64) -> bool {
        if self.current == Some(id) {
            self.current = None;
            true
        } else {
            false
        }
    }
}
