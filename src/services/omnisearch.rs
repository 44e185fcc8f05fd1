//! The tool surface as a typed async API.
//!
//! A thin RPC front-end marshals wire requests into these methods and
//! serializes the report types verbatim; nothing here knows about any
//! transport.

use crate::analyzer::{ProviderScore, QueryCharacteristics, Recommendation};
use crate::domain::error::{Error, Result};
use crate::domain::types::{ProviderCategory, SearchParams, UnifiedResult};
use crate::infrastructure::config::{OperatingMode, OrchestrationConfig};
use crate::routing::health::ProviderHealthRecord;
use crate::routing::orchestrator::{OrchestratorContext, SearchOrchestrator};
use crate::routing::tracker::{PerformanceInsights, ProviderStats, UserFeedback};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One provider's registration and health, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealthEntry {
    pub name: String,
    pub category: ProviderCategory,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<ProviderHealthRecord>,
}

/// Response shape of `provider_health`.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealthReport {
    pub providers: Vec<ProviderHealthEntry>,
    pub available_search: Vec<String>,
    pub available_ai_response: Vec<String>,
}

/// Request shape of `configure_providers`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigureRequest {
    pub provider_order: Option<Vec<String>>,
    pub disabled_providers: Option<Vec<String>>,
    pub fallback_enabled: Option<bool>,
    /// Which category `provider_order` applies to; defaults to `search`.
    pub category: Option<ProviderCategory>,
}

/// Response shape of `get_provider_config`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigReport {
    pub configuration: OrchestrationConfig,
    pub provider_health: HashMap<String, ProviderHealthRecord>,
    pub search_order: Vec<String>,
    pub ai_response_order: Vec<String>,
}

/// Response shape of `analyze_query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnalysisReport {
    pub query: String,
    pub analysis: QueryCharacteristics,
    pub recommendation: Recommendation,
    pub provider_scores: Vec<ProviderScore>,
}

/// Response shape of `performance_insights`.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceInsightsReport {
    pub insights: PerformanceInsights,
    pub provider_statistics: HashMap<String, ProviderStats>,
    pub detailed_export: serde_json::Value,
}

/// The orchestration core's public service.
pub struct OmnisearchService {
    orchestrator: SearchOrchestrator,
}

impl OmnisearchService {
    pub fn new(ctx: Arc<OrchestratorContext>) -> Self {
        Self {
            orchestrator: SearchOrchestrator::new(ctx),
        }
    }

    fn ctx(&self) -> &Arc<OrchestratorContext> {
        self.orchestrator.context()
    }

    /// Mode-aware entry point: unified mode orchestrates with fallback,
    /// direct mode routes to the preferred provider for the query.
    pub async fn search(&self, params: SearchParams) -> UnifiedResult {
        match self.ctx().config.mode() {
            OperatingMode::Unified => self.unified_search(params).await,
            OperatingMode::Direct => {
                let available = self
                    .ctx()
                    .health
                    .available_providers(ProviderCategory::Search)
                    .await;
                match self
                    .ctx()
                    .config
                    .preferred_provider_for_query(&params.query, &available)
                {
                    Some(provider) => self.orchestrator.search_provider(&provider, &params).await,
                    None => UnifiedResult::failure(
                        Error::NoProviders {
                            category: ProviderCategory::Search,
                        }
                        .to_string(),
                        Vec::new(),
                        0,
                    ),
                }
            }
        }
    }

    pub async fn unified_search(&self, params: SearchParams) -> UnifiedResult {
        self.orchestrator.unified_search(params).await
    }

    pub async fn unified_search_with_cancel(
        &self,
        params: SearchParams,
        cancel: CancellationToken,
    ) -> UnifiedResult {
        self.orchestrator
            .unified_search_with_cancel(params, cancel)
            .await
    }

    pub async fn unified_ai_search(&self, params: SearchParams) -> UnifiedResult {
        self.orchestrator.unified_ai_search(params).await
    }

    pub async fn unified_ai_search_with_cancel(
        &self,
        params: SearchParams,
        cancel: CancellationToken,
    ) -> UnifiedResult {
        self.orchestrator
            .unified_ai_search_with_cancel(params, cancel)
            .await
    }

    /// Health and availability for every registered provider.
    pub async fn provider_health(&self) -> ProviderHealthReport {
        let ctx = self.ctx();
        let mut registered = ctx.registry.list_all();
        registered.sort_by(|a, b| a.0.cmp(&b.0));

        let mut providers = Vec::with_capacity(registered.len());
        for (name, category) in registered {
            let available = ctx.health.is_available(&name).await;
            providers.push(ProviderHealthEntry {
                health: ctx.health.record(&name).await,
                name,
                category,
                available,
            });
        }

        ProviderHealthReport {
            providers,
            available_search: ctx.health.available_providers(ProviderCategory::Search).await,
            available_ai_response: ctx
                .health
                .available_providers(ProviderCategory::AiResponse)
                .await,
        }
    }

    /// Manually reset a provider's failure state.
    pub async fn reset_provider_health(&self, provider: &str) -> Result<()> {
        let ctx = self.ctx();
        if !ctx.registry.contains(provider) {
            return Err(Error::not_found(format!("provider '{}'", provider)));
        }
        ctx.health.reset(provider).await;
        Ok(())
    }

    /// Apply runtime configuration changes; every accepted field persists
    /// as an override.
    pub async fn configure_providers(&self, request: ConfigureRequest) -> Result<ConfigReport> {
        let ctx = self.ctx();
        let category = request.category.unwrap_or(ProviderCategory::Search);

        if let Some(order) = request.provider_order {
            if order.is_empty() {
                return Err(Error::invalid_argument("provider_order must not be empty"));
            }
            ctx.config.set_provider_order(category, order);
        }
        if let Some(disabled) = request.disabled_providers {
            ctx.config.set_disabled_providers(disabled);
        }
        if let Some(enabled) = request.fallback_enabled {
            ctx.config.set_fallback_enabled(enabled);
        }
        info!("provider configuration updated");
        Ok(self.get_provider_config().await)
    }

    pub async fn get_provider_config(&self) -> ConfigReport {
        let ctx = self.ctx();
        ConfigReport {
            configuration: ctx.config.snapshot(),
            provider_health: ctx.health.all_records().await,
            search_order: ctx.config.provider_order(ProviderCategory::Search),
            ai_response_order: ctx.config.provider_order(ProviderCategory::AiResponse),
        }
    }

    /// Pure analysis of a query: characteristics, recommendation, and the
    /// full score breakdown over the configured search candidates.
    pub fn analyze_query(&self, query: &str) -> QueryAnalysisReport {
        let ctx = self.ctx();
        let analysis = ctx.analyzer.analyze(query);
        let candidates: Vec<String> = ctx
            .config
            .provider_order(ProviderCategory::Search)
            .into_iter()
            .filter(|name| ctx.registry.contains(name))
            .collect();
        QueryAnalysisReport {
            query: query.to_string(),
            recommendation: ctx.analyzer.recommend(&analysis, &candidates),
            provider_scores: ctx.analyzer.score_providers(&analysis, &candidates),
            analysis,
        }
    }

    pub async fn performance_insights(&self) -> PerformanceInsightsReport {
        let ctx = self.ctx();
        PerformanceInsightsReport {
            insights: ctx.tracker.insights().await,
            provider_statistics: ctx.tracker.stats().await,
            detailed_export: ctx.tracker.export().await,
        }
    }

    /// Attach user feedback to the latest record for a query.
    pub async fn record_feedback(&self, query: &str, feedback: UserFeedback) -> bool {
        self.ctx().tracker.record_feedback(query, feedback).await
    }

    pub fn mode(&self) -> OperatingMode {
        self.ctx().config.mode()
    }

    pub fn set_mode(&self, mode: OperatingMode) {
        self.ctx().config.set_mode(mode);
    }

    /// Write the snapshot immediately; used on graceful shutdown.
    pub async fn flush_state(&self) -> Result<()> {
        self.ctx().state.flush().await
    }
}
