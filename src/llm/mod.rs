//! Chat-completion client and provider adapters
//!
//! The orchestrator hands a user utterance to [`CompletionClient::complete`]
//! together with the active [`ProviderConfig`]. The client owns throttling and
//! rate-limit backoff; adapters only differ in request shaping and in where the
//! reply lives in the response body.

pub mod adapters;
pub mod client;
pub mod prompts;
pub mod provider;
pub mod reply;
pub mod retry;
pub mod transport;

pub use client::{CompletionClient, RateLimitWindow};
pub use provider::{Provider, ProviderConfig, ProviderRegistry, ProviderSettings, RequestShape};
pub use reply::{prepare_reply, speakable_text, PreparedReply};
pub use retry::RetryPolicy;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Terminal outcome of a completion that produced no reply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("API rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Provider returned HTTP {status}")]
    ProviderError { status: u16 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    TransportError(String),

    #[error("No API key configured for {0}")]
    MissingCredential(Provider),
}

impl CompletionError {
    /// Whether trying again later could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            CompletionError::RateLimited { .. } => true,
            CompletionError::ProviderError { status } => *status >= 500,
            CompletionError::MalformedResponse(_) => true,
            CompletionError::TransportError(_) => true,
            CompletionError::MissingCredential(_) => false,
        }
    }
}

/// Progress the client reports while a request is delayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionNotice {
    /// Waiting out the provider's minimum request interval
    Throttling { wait: Duration },

    /// A 429 was received and the request will be retried
    RateLimitRetry {
        attempt: u32,
        max_retries: u32,
        delay: Duration,
    },
}

/// Whole seconds, rounded up
pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    let ms = duration.as_millis() as u64;
    ms.div_ceil(1000)
}

impl fmt::Display for CompletionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionNotice::Throttling { wait } => write!(
                f,
                "Throttling requests to prevent rate limits. Waiting {} seconds...",
                ceil_secs(*wait)
            ),
            CompletionNotice::RateLimitRetry {
                attempt,
                max_retries,
                delay,
            } => write!(
                f,
                "API rate limit reached. Retrying in {} seconds... (attempt {}/{})",
                ceil_secs(*delay),
                attempt,
                max_retries
            ),
        }
    }
}
