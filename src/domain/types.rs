//! Core wire-shape types shared by the orchestrator and its adapters

use crate::analyzer::QueryType;
use serde::{Deserialize, Serialize};

/// Category a provider is registered under.
///
/// Category membership is metadata at registration time; the orchestrator
/// runs the same selection and fallback algorithm over either set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    Search,
    AiResponse,
}

impl std::fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderCategory::Search => write!(f, "search"),
            ProviderCategory::AiResponse => write!(f, "ai_response"),
        }
    }
}

/// Parameters accepted by every search adapter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    /// Result cap, 1..=50 when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_domains: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_domains: Option<Vec<String>>,
}

impl SearchParams {
    pub fn new<S: Into<String>>(query: S) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// A single result as returned by any back-end adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub source_provider: String,
}

/// Condensed analysis attached to a successful unified search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub recommended_provider: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// Envelope returned by every orchestrated search call.
///
/// The orchestrator never fails across its public boundary: exhaustion,
/// cancellation, and empty candidate sets all come back as `success = false`
/// with an explanatory `error` string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedResult {
    pub results: Vec<SearchResult>,
    pub provider_used: String,
    /// Every provider that was tried and failed, in dispatch order.
    pub fallback_attempts: Vec<String>,
    pub total_time_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_analysis: Option<QueryAnalysis>,
}

impl UnifiedResult {
    /// An empty failure envelope carrying only an error message.
    pub fn failure<S: Into<String>>(error: S, fallback_attempts: Vec<String>, total_time_ms: u64) -> Self {
        Self {
            results: Vec::new(),
            provider_used: String::new(),
            fallback_attempts,
            total_time_ms,
            success: false,
            error: Some(error.into()),
            query_analysis: None,
        }
    }
}
