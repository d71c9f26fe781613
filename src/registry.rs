//! Provider registry keyed by provider identifier.
//!
//! Replaces per-call `supports(provider)` probing with a tagged lookup:
//! providers are registered once at startup under a stable identifier and
//! resolved in O(1) per request. The registry stores trait objects, so chat
//! and embedding capabilities are registered independently — a provider
//! implementing both is registered under each map.
//!
//! # Example
//!
//! ```ignore
//! use quotagate_llm::{AzureProvider, ProviderRegistry};
//!
//! let mut registry = ProviderRegistry::new();
//! let azure = Arc::new(AzureProvider::from_secret_store(&vault, "secret/data/azure", gate).await?);
//! registry.register_chat(AzureProvider::PROVIDER_ID, azure.clone());
//! registry.register_embedding(AzureProvider::PROVIDER_ID, azure);
//!
//! let provider = registry.get_chat("azure").expect("azure is registered");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::{ChatProvider, EmbeddingProvider};

/// Registry of chat and embedding providers.
#[derive(Default)]
pub struct ProviderRegistry {
    chat_providers: HashMap<String, Arc<dyn ChatProvider>>,
    embedding_providers: HashMap<String, Arc<dyn EmbeddingProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chat provider. An existing entry under the same id is
    /// replaced.
    pub fn register_chat(&mut self, id: impl Into<String>, provider: Arc<dyn ChatProvider>) {
        self.chat_providers.insert(id.into(), provider);
    }

    /// Register an embedding provider. An existing entry under the same id
    /// is replaced.
    pub fn register_embedding(
        &mut self,
        id: impl Into<String>,
        provider: Arc<dyn EmbeddingProvider>,
    ) {
        self.embedding_providers.insert(id.into(), provider);
    }

    /// Get a chat provider by id.
    pub fn get_chat(&self, id: &str) -> Option<Arc<dyn ChatProvider>> {
        self.chat_providers.get(id).cloned()
    }

    /// Get an embedding provider by id.
    pub fn get_embedding(&self, id: &str) -> Option<Arc<dyn EmbeddingProvider>> {
        self.embedding_providers.get(id).cloned()
    }

    /// Whether a chat provider is registered under `id`.
    pub fn has_chat(&self, id: &str) -> bool {
        self.chat_providers.contains_key(id)
    }

    /// Whether an embedding provider is registered under `id`.
    pub fn has_embedding(&self, id: &str) -> bool {
        self.embedding_providers.contains_key(id)
    }

    /// Registered chat provider ids, in arbitrary order.
    pub fn list_chat(&self) -> Vec<String> {
        self.chat_providers.keys().cloned().collect()
    }

    /// Registered embedding provider ids, in arbitrary order.
    pub fn list_embedding(&self) -> Vec<String> {
        self.embedding_providers.keys().cloned().collect()
    }

    /// Remove a chat provider, returning it if present.
    pub fn remove_chat(&mut self, id: &str) -> Option<Arc<dyn ChatProvider>> {
        self.chat_providers.remove(id)
    }

    /// Remove an embedding provider, returning it if present.
    pub fn remove_embedding(&mut self, id: &str) -> Option<Arc<dyn EmbeddingProvider>> {
        self.embedding_providers.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;

    #[test]
    fn test_empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.get_chat("azure").is_none());
        assert!(registry.get_embedding("azure").is_none());
        assert!(!registry.has_chat("azure"));
        assert!(registry.list_chat().is_empty());
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ProviderRegistry::new();
        let mock = Arc::new(MockProvider::new());
        registry.register_chat("mock", mock.clone());
        registry.register_embedding("mock", mock);

        assert!(registry.has_chat("mock"));
        assert!(registry.has_embedding("mock"));
        assert!(registry.get_chat("mock").is_some());
        assert!(registry.get_embedding("mock").is_some());
    }

    #[test]
    fn test_get_returns_same_instance() {
        let mut registry = ProviderRegistry::new();
        registry.register_chat("mock", Arc::new(MockProvider::new()));

        let first = registry.get_chat("mock").unwrap();
        let second = registry.get_chat("mock").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = ProviderRegistry::new();
        registry.register_chat("mock", Arc::new(MockProvider::new()));
        let original = registry.get_chat("mock").unwrap();

        registry.register_chat("mock", Arc::new(MockProvider::new()));
        let replaced = registry.get_chat("mock").unwrap();
        assert!(!Arc::ptr_eq(&original, &replaced));
    }

    #[test]
    fn test_remove() {
        let mut registry = ProviderRegistry::new();
        registry.register_chat("mock", Arc::new(MockProvider::new()));

        assert!(registry.remove_chat("mock").is_some());
        assert!(!registry.has_chat("mock"));
        assert!(registry.remove_chat("mock").is_none());
    }

    #[test]
    fn test_chat_and_embedding_maps_are_independent() {
        let mut registry = ProviderRegistry::new();
        registry.register_chat("mock", Arc::new(MockProvider::new()));

        assert!(registry.has_chat("mock"));
        assert!(!registry.has_embedding("mock"));

        registry.remove_chat("mock");
        registry.register_embedding("mock", Arc::new(MockProvider::new()));
        assert!(!registry.has_chat("mock"));
        assert!(registry.has_embedding("mock"));
    }

    #[test]
    fn test_list() {
        let mut registry = ProviderRegistry::new();
        registry.register_chat("a", Arc::new(MockProvider::new()));
        registry.register_chat("b", Arc::new(MockProvider::new()));

        let mut ids = registry.list_chat();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
