//! Chat-completion providers and their per-provider settings

use crate::credentials::CredentialSource;
use crate::{JarvisError, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Supported completion backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
    DeepSeek,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Gemini, Provider::OpenAi, Provider::DeepSeek];

    /// Stable identifier used in config files and persisted preferences
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::DeepSeek => "deepseek",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Google Gemini",
            Provider::OpenAi => "OpenAI",
            Provider::DeepSeek => "DeepSeek",
        }
    }

    /// Environment variable holding the API key
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// Where users obtain a key
    pub fn key_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://makersuite.google.com/app/apikey",
            Provider::OpenAi => "https://platform.openai.com/api-keys",
            Provider::DeepSeek => "https://platform.deepseek.com/api_keys",
        }
    }

    pub fn shape(&self) -> RequestShape {
        match self {
            Provider::Gemini => RequestShape::GenerateContent,
            Provider::OpenAi | Provider::DeepSeek => RequestShape::ChatCompletions,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = JarvisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            "deepseek" => Ok(Provider::DeepSeek),
            other => Err(JarvisError::ConfigError(format!("unknown provider: {other}"))),
        }
    }
}

/// Payload schema family spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// `generateContent` with `contents[].parts[]`, reply at `candidates[0].content.parts[0].text`
    GenerateContent,
    /// OpenAI-style `messages[]`, reply at `choices[0].message.content`
    ChatCompletions,
}

/// User-tunable settings for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Full request URL
    pub endpoint: String,

    /// Model name (ignored by the generateContent shape, whose model is in the URL)
    pub model: String,

    /// Minimum spacing between requests to this provider
    pub min_interval_ms: u64,
}

impl ProviderSettings {
    pub fn defaults_for(provider: Provider) -> Self {
        let (endpoint, model) = match provider {
            Provider::Gemini => (
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent",
                "gemini-1.5-flash",
            ),
            Provider::OpenAi => ("https://api.openai.com/v1/chat/completions", "gpt-4o-mini"),
            Provider::DeepSeek => ("https://api.deepseek.com/chat/completions", "deepseek-chat"),
        };
        Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            min_interval_ms: 3000,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_min_interval_ms(mut self, ms: u64) -> Self {
        self.min_interval_ms = ms;
        self
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::defaults_for(Provider::Gemini)
    }
}

/// Everything needed to dispatch to one provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub id: Provider,
    pub credential: Option<SecretString>,
    pub endpoint: String,
    pub model: String,
    pub shape: RequestShape,
    pub min_interval: Duration,
}

impl ProviderConfig {
    pub fn new(id: Provider, settings: &ProviderSettings, credential: Option<SecretString>) -> Self {
        Self {
            id,
            credential,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            shape: id.shape(),
            min_interval: Duration::from_millis(settings.min_interval_ms),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

/// Provider configs resolved once at startup
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    configs: BTreeMap<Provider, ProviderConfig>,
}

impl ProviderRegistry {
    pub fn build(
        settings: &BTreeMap<Provider, ProviderSettings>,
        credentials: &dyn CredentialSource,
    ) -> Self {
        let configs = Provider::ALL
            .iter()
            .map(|&provider| {
                let resolved = settings
                    .get(&provider)
                    .cloned()
                    .unwrap_or_else(|| ProviderSettings::defaults_for(provider));
                let config =
                    ProviderConfig::new(provider, &resolved, credentials.credential_for(provider));
                (provider, config)
            })
            .collect();
        Self { configs }
    }

    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        // build() fills every provider
        &self.configs[&provider]
    }

    /// Providers that currently have a credential
    pub fn usable(&self) -> Vec<Provider> {
        self.configs
            .values()
            .filter(|c| c.has_credential())
            .map(|c| c.id)
            .collect()
    }
}
