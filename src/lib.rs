pub mod credentials;
pub mod integration;
pub mod llm;
pub mod messages;
pub mod persistence;
pub mod speech;
pub mod ui;

use llm::CompletionError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JarvisError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Speech recognition is not supported")]
    RecognitionUnsupported,

    #[error("Recognition error: {0}")]
    RecognitionError(String),

    #[error("Synthesis error: {0}")]
    SynthesisError(String),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<std::io::Error> for JarvisError {
    fn from(e: std::io::Error) -> Self {
        JarvisError::StorageError(e.to_string())
    }
}

impl JarvisError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The user has to grant access in the platform settings
            JarvisError::PermissionDenied => false,
            // Engine missing entirely, mic stays inert
            JarvisError::RecognitionUnsupported => false,
            JarvisError::RecognitionError(_) => true,
            JarvisError::SynthesisError(_) => true,
            JarvisError::Completion(e) => e.is_recoverable(),
            // Persistence is best-effort
            JarvisError::StorageError(_) => true,
            JarvisError::ConfigError(_) => false,
            JarvisError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            JarvisError::PermissionDenied => {
                "Microphone access required. Please allow it and try again.".to_string()
            }
            JarvisError::RecognitionUnsupported => {
                "Voice recognition is not available. You can still type your questions."
                    .to_string()
            }
            JarvisError::RecognitionError(_) => {
                "Speech recognition failed. Please try again.".to_string()
            }
            JarvisError::SynthesisError(_) => {
                "Text-to-speech failed. The response is shown as text.".to_string()
            }
            JarvisError::Completion(e) => e.to_string(),
            JarvisError::StorageError(_) => {
                "Could not save your history. Changes are kept for this session only.".to_string()
            }
            JarvisError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            JarvisError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, JarvisError>;
