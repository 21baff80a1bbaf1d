//! Provider router: selects the correct LLM provider based on config.

use crate::openai_compat::OpenAiCompatProvider;
use nova_config::AppConfig;
use nova_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// All registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration: every `[providers.<name>]` section,
/// plus the default provider and the embedding provider when they have no
/// section of their own.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for name in config.providers.keys() {
        router.register(name.clone(), Arc::new(provider_for(config, name)));
    }

    let mut implicit = vec![config.default_provider.as_str()];
    if config.retrieval.uses_embeddings() {
        implicit.push(config.retrieval.embedding_provider.as_str());
    }
    for name in implicit {
        if router.get(name).is_none() {
            router.register(name, Arc::new(provider_for(config, name)));
        }
    }

    router
}

fn provider_for(config: &AppConfig, name: &str) -> OpenAiCompatProvider {
    let base_url = base_url_for(config, name);
    let api_key = config.api_key_for(name).unwrap_or_default();

    if api_key.is_empty() && !is_local(&base_url) {
        warn!(provider = name, "No API key configured; requests will be rejected");
    }

    OpenAiCompatProvider::new(name, base_url, api_key)
}

/// The endpoint for `name`: its configured `api_url`, else the well-known
/// default.
pub fn base_url_for(config: &AppConfig, name: &str) -> String {
    config
        .providers
        .get(name)
        .and_then(|p| p.api_url.clone())
        .unwrap_or_else(|| default_base_url(name))
}

/// Whether `base_url` points at this machine (no API key needed).
pub fn is_local(base_url: &str) -> bool {
    base_url.starts_with("http://localhost") || base_url.starts_with("http://127.0.0.1")
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "groq" => "https://api.groq.com/openai/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nova_config::ProviderConfig;

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("groq");
        router.register("groq", Arc::new(OpenAiCompatProvider::groq("gsk-test")));

        assert!(router.get("groq").is_some());
        assert!(router.get("nonexistent").is_none());
        assert_eq!(router.default_provider().unwrap().name(), "groq");
    }

    #[test]
    fn default_base_urls() {
        assert_eq!(default_base_url("groq"), "https://api.groq.com/openai/v1");
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(is_local(&default_base_url("ollama")));
    }

    #[test]
    fn build_from_default_config() {
        let router = build_from_config(&AppConfig::default());
        assert_eq!(router.list(), vec!["groq"]);
        assert_eq!(router.default_provider().unwrap().name(), "groq");
    }

    #[test]
    fn configured_sections_and_embedding_provider() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "ollama".into(),
            ProviderConfig {
                api_url: Some("http://localhost:11434/v1".into()),
                ..ProviderConfig::default()
            },
        );
        config.retrieval.embedding_provider = "openai".into();

        let router = build_from_config(&config);
        assert_eq!(router.list(), vec!["groq", "ollama", "openai"]);
        assert!(is_local(&base_url_for(&config, "ollama")));
        assert!(!is_local(&base_url_for(&config, "openai")));
    }
}
