//! Provider registry.
//!
//! Concrete [`LanguageModelProvider`] adapters are registered at startup,
//! keyed by [`ProviderKind`]. The state machine looks providers up per phase;
//! a phase whose kind has no registered provider fails without an attempt.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use conductor_core::graph::ProviderKind;
use conductor_core::provider::{Completion, CompletionRequest, LanguageModelProvider, ProviderError};

#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn LanguageModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in static provider, for dry runs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StaticProvider::default()));
        registry
    }

    /// Register a provider under its own kind, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn LanguageModelProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn LanguageModelProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }
}

/// Canned provider returning fixed content at zero cost.
pub struct StaticProvider {
    content: String,
}

impl StaticProvider {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl Default for StaticProvider {
    fn default() -> Self {
        Self::new("[static provider output]")
    }
}

#[async_trait]
impl LanguageModelProvider for StaticProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Static
    }

    async fn submit(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        Ok(Completion {
            content: self.content.clone(),
            tokens_input: 0,
            tokens_output: 0,
            cost_usd: 0.0,
            model_used: request.model,
            todos: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_by_kind() {
        let registry = ProviderRegistry::with_defaults();
        let provider = registry.get(ProviderKind::Static).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Static);
        assert!(registry.get(ProviderKind::Openai).is_none());
    }

    #[tokio::test]
    async fn static_provider_echoes_model_and_costs_nothing() {
        let provider = StaticProvider::new("canned");
        let completion = provider
            .submit(CompletionRequest {
                prompt: "p".into(),
                model: "m".into(),
                temperature: 0.1,
            })
            .await
            .unwrap();
        assert_eq!(completion.content, "canned");
        assert_eq!(completion.model_used, "m");
        assert_eq!(completion.cost_usd, 0.0);
    }
}
