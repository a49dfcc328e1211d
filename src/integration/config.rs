//! Configuration for the assistant
//!
//! Provides centralized configuration for all components. Every field has a
//! default, so a TOML file only needs the keys it changes.

use crate::llm::{Provider, ProviderSettings, RetryPolicy};
use crate::speech::VoiceSettings;
use crate::{JarvisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-provider overrides; unset fields keep the provider's defaults
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub min_interval_ms: Option<u64>,
}

impl ProviderOverrides {
    fn apply(&self, provider: Provider) -> ProviderSettings {
        let mut settings = ProviderSettings::defaults_for(provider);
        if let Some(endpoint) = &self.endpoint {
            settings.endpoint = endpoint.clone();
        }
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(ms) = self.min_interval_ms {
            settings.min_interval_ms = ms;
        }
        settings
    }
}

/// Listening timeouts, in milliseconds. Zero disables the timer for that path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoStopConfig {
    /// Armed when the user presses the mic
    pub on_user_start_ms: u64,

    /// Armed when listening restarts after a reply
    pub on_restart_ms: u64,
}

impl Default for AutoStopConfig {
    fn default() -> Self {
        Self {
            on_user_start_ms: 10_000,
            on_restart_ms: 10_000,
        }
    }
}

impl AutoStopConfig {
    pub fn disabled() -> Self {
        Self {
            on_user_start_ms: 0,
            on_restart_ms: 0,
        }
    }

    pub fn user_start(&self) -> Option<Duration> {
        non_zero(self.on_user_start_ms)
    }

    pub fn restart(&self) -> Option<Duration> {
        non_zero(self.on_restart_ms)
    }
}

fn non_zero(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Configuration for the complete assistant
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// BCP 47 tag used until the user picks another
    pub default_language: String,

    /// Provider used until the user picks another
    pub default_provider: Provider,

    /// Keyed by provider id (`gemini`, `openai`, `deepseek`)
    pub providers: BTreeMap<String, ProviderOverrides>,

    pub retry: RetryPolicy,

    pub auto_stop: AutoStopConfig,

    /// Start listening again once a reply has been spoken
    pub relisten_after_reply: bool,

    /// How long to wait for speech engines to load at startup
    pub engine_ready_timeout_ms: u64,

    /// HTTP timeout for a single completion attempt
    pub request_timeout_ms: u64,

    pub voice: VoiceSettings,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            default_language: "en-US".to_string(),
            default_provider: Provider::Gemini,
            providers: BTreeMap::new(),
            retry: RetryPolicy::default(),
            auto_stop: AutoStopConfig::default(),
            relisten_after_reply: false,
            engine_ready_timeout_ms: 5000,
            request_timeout_ms: 30_000,
            voice: VoiceSettings::default(),
        }
    }
}

impl AssistantConfig {
    /// `<config dir>/jarvis/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jarvis").join("config.toml"))
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            JarvisError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| JarvisError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AssistantConfig =
            toml::from_str(content).map_err(|e| JarvisError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the starting language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    /// Set the starting provider
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.default_provider = provider;
        self
    }

    pub fn with_provider_overrides(mut self, provider: Provider, overrides: ProviderOverrides) -> Self {
        self.providers.insert(provider.as_str().to_string(), overrides);
        self
    }

    /// Override only the minimum request interval for `provider`
    pub fn with_min_interval_ms(mut self, provider: Provider, ms: u64) -> Self {
        self.providers
            .entry(provider.as_str().to_string())
            .or_default()
            .min_interval_ms = Some(ms);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_auto_stop(mut self, auto_stop: AutoStopConfig) -> Self {
        self.auto_stop = auto_stop;
        self
    }

    /// Never stop listening on a timer
    pub fn without_auto_stop(mut self) -> Self {
        self.auto_stop = AutoStopConfig::disabled();
        self
    }

    pub fn with_relisten_after_reply(mut self) -> Self {
        self.relisten_after_reply = true;
        self
    }

    pub fn with_voice(mut self, voice: VoiceSettings) -> Self {
        self.voice = voice;
        self
    }

    pub fn engine_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_ready_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Resolved settings for every provider
    pub fn provider_settings(&self) -> Result<BTreeMap<Provider, ProviderSettings>> {
        let mut resolved: BTreeMap<Provider, ProviderSettings> = Provider::ALL
            .iter()
            .map(|&p| (p, ProviderSettings::defaults_for(p)))
            .collect();
        for (key, overrides) in &self.providers {
            let provider: Provider = key.parse()?;
            resolved.insert(provider, overrides.apply(provider));
        }
        Ok(resolved)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_language.trim().is_empty() {
            return Err(JarvisError::ConfigError(
                "default_language must not be empty".to_string(),
            ));
        }

        for (provider, settings) in self.provider_settings()? {
            if !settings.endpoint.starts_with("http://") && !settings.endpoint.starts_with("https://")
            {
                return Err(JarvisError::ConfigError(format!(
                    "{} endpoint is not an http(s) URL: {}",
                    provider, settings.endpoint
                )));
            }
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(JarvisError::ConfigError(format!(
                "retry base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }

        if self.voice.rate <= 0.0 || self.voice.pitch <= 0.0 {
            return Err(JarvisError::ConfigError(
                "voice rate and pitch must be positive".to_string(),
            ));
        }

        if self.engine_ready_timeout_ms == 0 {
            return Err(JarvisError::ConfigError(
                "engine_ready_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
