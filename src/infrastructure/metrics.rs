//! Metrics collection for orchestration decisions.
//!
//! Pure side channel built on the `metrics` facade: nothing in the dispatch
//! path reads these series back.

use metrics::{counter, gauge, histogram};

/// Collector for orchestrator-level metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorMetrics;

impl OrchestratorMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Record which provider the combined ranking put first.
    pub fn record_selection(&self, provider: &str, strategy: &str) {
        counter!("omnisearch_provider_selections_total", "provider" => provider.to_string(), "strategy" => strategy.to_string()).increment(1);
    }

    /// Record the outcome of one provider visit.
    pub fn record_outcome(&self, provider: &str, category: &str, status: &str) {
        counter!("omnisearch_dispatch_outcomes_total", "provider" => provider.to_string(), "category" => category.to_string(), "status" => status.to_string()).increment(1);
    }

    /// Record a provider visit's response time.
    pub fn record_response_time(&self, provider: &str, duration_seconds: f64) {
        histogram!("omnisearch_provider_response_time_seconds", "provider" => provider.to_string()).record(duration_seconds);
    }

    /// Record a circuit-breaker state change.
    pub fn record_breaker_state(&self, provider: &str, open: bool) {
        gauge!("omnisearch_circuit_breaker_open", "provider" => provider.to_string())
            .set(if open { 1.0 } else { 0.0 });
    }

    /// Record how many providers failed before a call resolved.
    pub fn record_fallback_depth(&self, category: &str, depth: usize) {
        histogram!("omnisearch_fallback_depth", "category" => category.to_string())
            .record(depth as f64);
    }
}
