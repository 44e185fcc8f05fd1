//! MCP Omnisearch - a search orchestration core.
//!
//! Sits in front of a heterogeneous set of search and AI-answer back-ends:
//! classifies each query, ranks the currently healthy providers, dispatches
//! with retry/timeout/cancellation discipline, falls back through
//! alternates, and learns from outcomes to improve future selection.

pub mod adapters;
pub mod analyzer;
pub mod domain;
pub mod infrastructure;
pub mod routing;
pub mod services;

// Re-export the capability boundary
pub use domain::error::{Error, ErrorKind, Result};
pub use domain::ports::{Clock, Searcher};
pub use domain::types::{ProviderCategory, SearchParams, SearchResult, UnifiedResult};

// Re-export the orchestration entry points
pub use infrastructure::registry::ProviderRegistry;
pub use routing::orchestrator::{ContextBuilder, OrchestratorContext, SearchOrchestrator};
pub use services::omnisearch::OmnisearchService;
