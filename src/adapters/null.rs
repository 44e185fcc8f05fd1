//! No-op searcher

use crate::domain::error::Result;
use crate::domain::ports::Searcher;
use crate::domain::types::{SearchParams, SearchResult};
use async_trait::async_trait;

/// Searcher that always succeeds with no results. Useful for wiring tests
/// and as a stand-in while an adapter is being built.
pub struct NullSearcher {
    name: String,
}

impl NullSearcher {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Searcher for NullSearcher {
    async fn search(&self, _params: &SearchParams) -> Result<Vec<SearchResult>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "null searcher, always returns no results"
    }
}
