//! Immutable per-user selections

use crate::llm::{Provider, ProviderConfig, ProviderRegistry};
use std::sync::Arc;

/// Active provider and language. Changing either produces a new `Session`.
#[derive(Debug, Clone)]
pub struct Session {
    pub provider: Provider,
    pub language: String,
    registry: Arc<ProviderRegistry>,
}

impl Session {
    pub fn new(provider: Provider, language: impl Into<String>, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            provider,
            language: language.into(),
            registry,
        }
    }

    pub fn with_provider(&self, provider: Provider) -> Self {
        Self {
            provider,
            ..self.clone()
        }
    }

    pub fn with_language(&self, language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..self.clone()
        }
    }

    /// Config of the selected provider
    pub fn active(&self) -> &ProviderConfig {
        self.registry.get(self.provider)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Providers other than the active one that have a credential
    pub fn alternatives(&self) -> Vec<Provider> {
        self.registry
            .usable()
            .into_iter()
            .filter(|p| *p != self.provider)
            .collect()
    }
}
