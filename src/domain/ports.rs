//! Capability traits at the orchestration boundary

use crate::domain::error::Result;
use crate::domain::types::{SearchParams, SearchResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Uniform capability every back-end adapter exposes.
///
/// Adapters that are not configured (missing credentials) are simply never
/// registered; the orchestrator only ever sees this contract. Errors
/// returned by `search` must carry a classifiable kind and the provider
/// name.
#[async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<Vec<SearchResult>>;

    /// Stable lowercase identifier, may contain underscores.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;
}

/// Injected time source.
///
/// All cooldown and breaker arithmetic goes through this trait so the state
/// machines are testable without waiting out real clocks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
