//! Deterministic searchers for tests

use crate::domain::error::{Error, Result};
use crate::domain::ports::Searcher;
use crate::domain::types::{SearchParams, SearchResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Searcher that always returns the same fixed results.
pub struct StaticSearcher {
    name: String,
    results: Vec<SearchResult>,
    calls: AtomicUsize,
}

impl StaticSearcher {
    pub fn new<S: Into<String>>(name: S, results: Vec<SearchResult>) -> Self {
        Self {
            name: name.into(),
            results,
            calls: AtomicUsize::new(0),
        }
    }

    /// A searcher returning `count` boilerplate results.
    pub fn with_result_count<S: Into<String>>(name: S, count: usize) -> Self {
        let name = name.into();
        let results = (0..count)
            .map(|i| SearchResult {
                title: format!("result {}", i),
                url: format!("https://example.com/{}/{}", name, i),
                snippet: format!("snippet {}", i),
                score: Some(1.0 - i as f64 * 0.1),
                source_provider: name.clone(),
            })
            .collect();
        Self::new(name, results)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Searcher for StaticSearcher {
    async fn search(&self, _params: &SearchParams) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "static searcher, always returns fixed results"
    }
}

/// Searcher that plays back a queue of scripted outcomes, then repeats the
/// last behavior (or succeeds empty if the queue was never filled).
pub struct ScriptedSearcher {
    name: String,
    outcomes: Mutex<VecDeque<Result<Vec<SearchResult>>>>,
    calls: AtomicUsize,
}

impl ScriptedSearcher {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            outcomes: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push_ok(&self, results: Vec<SearchResult>) -> &Self {
        self.outcomes
            .lock()
            .expect("script lock poisoned")
            .push_back(Ok(results));
        self
    }

    pub fn push_err(&self, error: Error) -> &Self {
        self.outcomes
            .lock()
            .expect("script lock poisoned")
            .push_back(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Searcher for ScriptedSearcher {
    async fn search(&self, _params: &SearchParams) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .outcomes
            .lock()
            .expect("script lock poisoned")
            .pop_front();
        match next {
            Some(outcome) => outcome,
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "scripted searcher, plays back queued outcomes"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;

    #[tokio::test]
    async fn static_searcher_repeats_its_results() {
        let searcher = StaticSearcher::with_result_count("tavily", 2);
        let params = SearchParams::new("anything");

        let first = searcher.search(&params).await.unwrap();
        let second = searcher.search(&params).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].source_provider, "tavily");
        assert_eq!(searcher.calls(), 2);
    }

    #[tokio::test]
    async fn scripted_searcher_plays_back_then_succeeds_empty() {
        let searcher = ScriptedSearcher::new("brave");
        searcher
            .push_err(Error::provider(ErrorKind::ProviderError, "brave", "boom"))
            .push_ok(vec![]);

        assert!(searcher.search(&SearchParams::new("q")).await.is_err());
        assert!(searcher.search(&SearchParams::new("q")).await.unwrap().is_empty());
        // drained queue falls back to empty success
        assert!(searcher.search(&SearchParams::new("q")).await.unwrap().is_empty());
        assert_eq!(searcher.calls(), 3);
    }
}
