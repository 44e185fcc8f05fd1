//! Provider registry with category metadata

use crate::domain::error::{Error, Result};
use crate::domain::ports::Searcher;
use crate::domain::types::ProviderCategory;
use dashmap::DashMap;
use std::sync::Arc;

struct RegisteredProvider {
    searcher: Arc<dyn Searcher>,
    category: ProviderCategory,
}

/// Thread-safe registry of back-end adapters.
///
/// Adapters without credentials are never registered, so the registry is
/// also the source of truth for which providers exist at all. Category
/// membership is fixed at registration time.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Arc<DashMap<String, Arc<RegisteredProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a searcher under a category.
    pub fn register(&self, category: ProviderCategory, searcher: Arc<dyn Searcher>) -> Result<()> {
        let name = searcher.name().to_string();
        if self.providers.contains_key(&name) {
            return Err(Error::invalid_argument(format!(
                "provider '{}' already registered",
                name
            )));
        }
        self.providers
            .insert(name, Arc::new(RegisteredProvider { searcher, category }));
        Ok(())
    }

    /// Get a searcher by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Searcher>> {
        self.providers
            .get(name)
            .map(|p| Arc::clone(&p.searcher))
            .ok_or_else(|| Error::not_found(format!("provider '{}'", name)))
    }

    /// Category the provider was registered under.
    pub fn category_of(&self, name: &str) -> Option<ProviderCategory> {
        self.providers.get(name).map(|p| p.category)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// All provider names in a category, in unspecified order. Callers that
    /// care about ordering intersect this with the configured priority list.
    pub fn list(&self, category: ProviderCategory) -> Vec<String> {
        self.providers
            .iter()
            .filter(|entry| entry.category == category)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// All registered provider names with their categories.
    pub fn list_all(&self) -> Vec<(String, ProviderCategory)> {
        self.providers
            .iter()
            .map(|entry| (entry.key().clone(), entry.category))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::NullSearcher;

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = ProviderRegistry::new();
        registry
            .register(
                ProviderCategory::Search,
                Arc::new(NullSearcher::new("tavily")),
            )
            .unwrap();
        let err = registry.register(
            ProviderCategory::Search,
            Arc::new(NullSearcher::new("tavily")),
        );
        assert!(err.is_err());
    }

    #[test]
    fn listing_is_scoped_by_category() {
        let registry = ProviderRegistry::new();
        registry
            .register(
                ProviderCategory::Search,
                Arc::new(NullSearcher::new("tavily")),
            )
            .unwrap();
        registry
            .register(
                ProviderCategory::AiResponse,
                Arc::new(NullSearcher::new("perplexity")),
            )
            .unwrap();

        assert_eq!(registry.list(ProviderCategory::Search), vec!["tavily"]);
        assert_eq!(
            registry.list(ProviderCategory::AiResponse),
            vec!["perplexity"]
        );
        assert_eq!(
            registry.category_of("perplexity"),
            Some(ProviderCategory::AiResponse)
        );
        assert!(registry.get("missing").is_err());
    }
}
