//! API key sources
//!
//! A missing key only makes its provider unusable; it is never an error.

use crate::llm::Provider;
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

pub trait CredentialSource: Send + Sync {
    fn credential_for(&self, provider: Provider) -> Option<SecretString>;
}

/// Reads `GEMINI_API_KEY`, `OPENAI_API_KEY` and `DEEPSEEK_API_KEY`
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn credential_for(&self, provider: Provider) -> Option<SecretString> {
        std::env::var(provider.env_var())
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(SecretString::from)
    }
}

/// Fixed set of keys, used for `.env` files and tests
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<Provider, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.keys.insert(provider, key.into());
        self
    }

    /// Parse `.env` text: `KEY=value` lines, `#` comments, quotes stripped
    pub fn from_dotenv(text: &str) -> Self {
        let mut credentials = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().trim_start_matches("export ").trim();
            let value = value.trim().replace(['"', '\''], "");
            if value.is_empty() {
                continue;
            }
            if let Some(provider) = Provider::ALL.iter().find(|p| p.env_var() == key) {
                credentials.keys.insert(*provider, value);
            }
        }
        credentials
    }

    /// Load a `.env` file; a missing or unreadable file yields no keys
    pub fn from_dotenv_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let credentials = Self::from_dotenv(&text);
                info!(
                    "Loaded {} API key(s) from {}",
                    credentials.keys.len(),
                    path.display()
                );
                credentials
            }
            Err(e) => {
                debug!("No .env file at {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl CredentialSource for StaticCredentials {
    fn credential_for(&self, provider: Provider) -> Option<SecretString> {
        self.keys
            .get(&provider)
            .map(|key| SecretString::from(key.clone()))
    }
}

/// First source that has a key wins
#[derive(Default)]
pub struct ChainedCredentials {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl ChainedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl CredentialSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl CredentialSource for ChainedCredentials {
    fn credential_for(&self, provider: Provider) -> Option<SecretString> {
        self.sources
            .iter()
            .find_map(|source| source.credential_for(provider))
    }
}
