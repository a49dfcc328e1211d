//! Locally produced replies for turns that got no answer from a provider

use crate::llm::{CompletionError, Provider};

const RATE_LIMIT_REPLIES: [&str; 4] = [
    "I'm experiencing high demand right now. Give me a moment and ask again, or try a website command like 'open GitHub'.",
    "The AI service is busy. I can still help you navigate: try saying 'open YouTube'.",
    "The AI service is temporarily overloaded. Please wait a little before asking again.",
    "I've hit the request limit for now. While we wait, you can ask me to open a website.",
];

const GENERIC_REPLY: &str = "Sorry, I couldn't get an answer right now. Please try again.";

/// What to show and say when a turn fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    /// Failure description for the error area and the System transcript entry
    pub error: String,

    /// Reply shown as Jarvis and spoken aloud
    pub reply: String,
}

/// Chooses fallback text; rate-limit replies rotate so repeats are less jarring
#[derive(Debug, Default)]
pub struct FallbackResponder {
    next_rate_limit: usize,
}

impl FallbackResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fallback for `error` on a turn that asked `heard` of `provider`.
    /// `alternatives` are other providers that have a credential.
    pub fn respond(
        &mut self,
        error: &CompletionError,
        heard: &str,
        provider: Provider,
        alternatives: &[Provider],
    ) -> Fallback {
        let name = provider.display_name();
        match error {
            CompletionError::MissingCredential(_) => Fallback {
                error: missing_credential_notice(provider),
                reply: format!(
                    "I heard you say: {}. However, I need an API key to provide AI responses.",
                    heard.trim()
                ),
            },
            CompletionError::RateLimited { .. } => {
                let mut error = "API rate limit exceeded. Try switching to a different AI provider or wait a few minutes before trying again.".to_string();
                if !alternatives.is_empty() {
                    let names: Vec<&str> = alternatives.iter().map(|p| p.display_name()).collect();
                    error.push_str(&format!(" Available alternatives: {}", names.join(", ")));
                }
                let reply = RATE_LIMIT_REPLIES[self.next_rate_limit % RATE_LIMIT_REPLIES.len()];
                self.next_rate_limit += 1;
                Fallback {
                    error,
                    reply: reply.to_string(),
                }
            }
            CompletionError::ProviderError { status } => Fallback {
                error: match status {
                    401 => format!("{name} API key is invalid. Please check your configuration."),
                    403 => format!("{name} API access forbidden. Check your API key permissions."),
                    400 => format!("{name} API request error. Check API key and request format."),
                    other => format!("{name} returned an error (HTTP {other})."),
                },
                reply: GENERIC_REPLY.to_string(),
            },
            CompletionError::TransportError(_) => Fallback {
                error: "Network error. Please check your internet connection.".to_string(),
                reply: GENERIC_REPLY.to_string(),
            },
            CompletionError::MalformedResponse(_) => Fallback {
                error: format!("{name} sent a response I couldn't read."),
                reply: GENERIC_REPLY.to_string(),
            },
        }
    }
}

/// "API key required" notice with a pointer to where keys are issued
pub fn missing_credential_notice(provider: Provider) -> String {
    format!(
        "API key required for {}. Set {} or get a key at {}",
        provider.display_name(),
        provider.env_var(),
        provider.key_url()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_echoes_input() {
        let mut responder = FallbackResponder::new();
        let fallback = responder.respond(
            &CompletionError::MissingCredential(Provider::OpenAi),
            " what time is it ",
            Provider::OpenAi,
            &[],
        );
        assert_eq!(
            fallback.reply,
            "I heard you say: what time is it. However, I need an API key to provide AI responses."
        );
        assert!(fallback.error.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_rate_limit_rotates_and_lists_alternatives() {
        let mut responder = FallbackResponder::new();
        let error = CompletionError::RateLimited { attempts: 4 };

        let first = responder.respond(&error, "hi", Provider::Gemini, &[Provider::DeepSeek]);
        let second = responder.respond(&error, "hi", Provider::Gemini, &[]);

        assert_ne!(first.reply, second.reply);
        assert!(first.error.ends_with("Available alternatives: DeepSeek"));
        assert!(!second.error.contains("alternatives"));

        for _ in 0..RATE_LIMIT_REPLIES.len() - 2 {
            responder.respond(&error, "hi", Provider::Gemini, &[]);
        }
        let wrapped = responder.respond(&error, "hi", Provider::Gemini, &[]);
        assert_eq!(wrapped.reply, first.reply);
    }

    #[test]
    fn test_status_specific_errors() {
        let mut responder = FallbackResponder::new();
        let unauthorized = responder.respond(
            &CompletionError::ProviderError { status: 401 },
            "hi",
            Provider::DeepSeek,
            &[],
        );
        assert_eq!(
            unauthorized.error,
            "DeepSeek API key is invalid. Please check your configuration."
        );
        assert_eq!(unauthorized.reply, GENERIC_REPLY);

        let forbidden = responder.respond(
            &CompletionError::ProviderError { status: 403 },
            "hi",
            Provider::Gemini,
            &[],
        );
        assert!(forbidden.error.contains("forbidden"));

        let network = responder.respond(
            &CompletionError::TransportError("dns".into()),
            "hi",
            Provider::Gemini,
            &[],
        );
        assert!(network.error.starts_with("Network error"));
    }
}
