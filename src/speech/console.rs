//! Terminal stand-ins for the speech engines
//!
//! `ConsoleRecognition` treats lines typed while the microphone is open as
//! recognized utterances. `ConsoleSynthesis` prints what would be spoken and
//! holds the utterance open for roughly the time it would take to say it.

use super::input::{RecognitionEngine, UtteranceSink};
use super::output::{SynthesisEngine, SynthesisSink, Utterance};
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const MS_PER_WORD: u64 = 350;

/// Shared "open microphone" the console binary feeds lines into
#[derive(Clone, Default)]
pub struct ConsoleMicrophone {
    sink: Arc<Mutex<Option<UtteranceSink>>>,
}

impl ConsoleMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Deliver `line` as an utterance. Returns false when the mic is closed.
    pub fn hear(&self, line: &str) -> bool {
        match self.sink.lock().as_ref() {
            Some(sink) => sink.deliver(line),
            None => false,
        }
    }
}

pub struct ConsoleRecognition {
    microphone: ConsoleMicrophone,
}

impl ConsoleRecognition {
    pub fn new(microphone: ConsoleMicrophone) -> Self {
        Self { microphone }
    }
}

#[async_trait]
impl RecognitionEngine for ConsoleRecognition {
    async fn ready(&mut self) -> Result<()> {
        Ok(())
    }

    async fn request_permission(&mut self) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, language: &str, sink: UtteranceSink) -> Result<()> {
        debug!("Console microphone open ({})", language);
        *self.microphone.sink.lock() = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        *self.microphone.sink.lock() = None;
    }

    fn is_recognizing(&self) -> bool {
        self.microphone.is_open()
    }
}

#[derive(Default)]
pub struct ConsoleSynthesis {
    playing: Option<JoinHandle<()>>,
}

impl ConsoleSynthesis {
    pub fn new() -> Self {
        Self::default()
    }
}

fn speaking_time(text: &str) -> Duration {
    let words = text.split_whitespace().count().max(1) as u64;
    Duration::from_millis(words * MS_PER_WORD)
}

#[async_trait]
impl SynthesisEngine for ConsoleSynthesis {
    async fn ready(&mut self) -> Result<()> {
        Ok(())
    }

    fn speak(&mut self, utterance: Utterance, sink: SynthesisSink) -> Result<()> {
        self.cancel();
        println!("🔊 {}", utterance.text);

        let duration = speaking_time(&utterance.text).mul_f32(1.0 / utterance.rate.max(0.1));
        self.playing = Some(tokio::spawn(async move {
            sink.started();
            tokio::time::sleep(duration).await;
            sink.ended();
        }));
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(task) = self.playing.take() {
            task.abort();
        }
    }

    fn is_speaking(&self) -> bool {
        self.playing
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}
