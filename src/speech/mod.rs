//! Speech input and output sessions
//!
//! This module provides:
//! - Speech-to-text sessions over a pluggable [`RecognitionEngine`]
//! - Text-to-speech sessions over a pluggable [`SynthesisEngine`]
//! - Console engines for running in a terminal

pub mod console;
pub mod input;
pub mod output;

// Re-export commonly used types
pub use console::{ConsoleMicrophone, ConsoleRecognition, ConsoleSynthesis};
pub use input::{RecognitionEngine, SpeechInputSession, UtteranceSink};
pub use output::{SpeechOutputSession, SynthesisEngine, SynthesisSink, Utterance, VoiceSettings};
