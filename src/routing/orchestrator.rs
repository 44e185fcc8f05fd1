//! Orchestrated dispatch: combined ranking, per-attempt deadlines with
//! bounded retries, sequential fallback, and outcome recording.

use crate::analyzer::{QueryAnalyzer, QueryCharacteristics, Recommendation};
use crate::domain::error::{Error, ErrorKind};
use crate::domain::ports::Clock;
use crate::domain::types::{ProviderCategory, QueryAnalysis, SearchParams, SearchResult, UnifiedResult};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::config::ProviderConfigManager;
use crate::infrastructure::metrics::OrchestratorMetrics;
use crate::infrastructure::registry::ProviderRegistry;
use crate::infrastructure::state::{PersistedState, StateConfig, StateManager, StateSource, STATE_FORMAT_VERSION};
use crate::routing::health::ProviderHealthManager;
use crate::routing::tracker::{PerformanceTracker, QueryPerformanceRecord};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Recommendations above this confidence jump the adaptive ranking.
const CONFIDENCE_GATE: f64 = 70.0;

const RETRY_BASE_DELAY_MS: u64 = 1000;
const RETRY_MAX_DELAY_MS: u64 = 5000;

/// Shared subsystems, injected into every entry point.
///
/// One context is built per process (or per test) so nothing relies on
/// module-level lifetimes.
pub struct OrchestratorContext {
    pub registry: Arc<ProviderRegistry>,
    pub config: Arc<ProviderConfigManager>,
    pub health: Arc<ProviderHealthManager>,
    pub tracker: Arc<PerformanceTracker>,
    pub analyzer: QueryAnalyzer,
    pub state: Arc<StateManager>,
    pub clock: Arc<dyn Clock>,
    pub metrics: OrchestratorMetrics,
}

#[async_trait]
impl StateSource for OrchestratorContext {
    async fn snapshot(&self) -> PersistedState {
        PersistedState {
            version: STATE_FORMAT_VERSION.to_string(),
            last_updated: self.clock.now(),
            provider_health: self.health.all_records().await,
            performance_records: self.tracker.records().await,
            configuration_overrides: self.config.overrides(),
        }
    }
}

/// Assembles an [`OrchestratorContext`]: loads the persisted snapshot,
/// layers configuration, seeds health and tracker state, and wires the
/// context back into the state manager as its snapshot source.
pub struct ContextBuilder {
    registry: Arc<ProviderRegistry>,
    state_config: StateConfig,
    clock: Arc<dyn Clock>,
    env_pairs: Option<Vec<(String, String)>>,
}

impl ContextBuilder {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            state_config: StateConfig::standard(),
            clock: Arc::new(SystemClock),
            env_pairs: None,
        }
    }

    pub fn with_state_config(mut self, config: StateConfig) -> Self {
        self.state_config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Apply `OMNISEARCH_*` variables from the process environment.
    pub fn with_process_env(mut self) -> Self {
        self.state_config = self.state_config.from_env();
        self.env_pairs = Some(std::env::vars().collect());
        self
    }

    /// Apply an explicit variable list instead of the process environment.
    pub fn with_env_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.state_config = self.state_config.from_env_pairs(&pairs);
        self.env_pairs = Some(pairs);
        self
    }

    pub async fn build(self) -> Arc<OrchestratorContext> {
        let state = StateManager::new(self.state_config);
        let persisted = state.load().await;

        let env_pairs = self.env_pairs.unwrap_or_default();
        let config = Arc::new(ProviderConfigManager::from_env_pairs(
            Arc::clone(&state),
            &env_pairs,
            &persisted.configuration_overrides,
        ));

        let health = Arc::new(ProviderHealthManager::with_records(
            Arc::clone(&self.registry),
            Arc::clone(&config),
            Arc::clone(&state),
            Arc::clone(&self.clock),
            persisted.provider_health,
        ));
        let tracker = Arc::new(PerformanceTracker::from_records(
            persisted.performance_records,
            state.max_history(),
            Arc::clone(&self.clock),
            Arc::clone(&state),
        ));

        let context = Arc::new(OrchestratorContext {
            registry: self.registry,
            config,
            health,
            tracker,
            analyzer: QueryAnalyzer::new(),
            state: Arc::clone(&state),
            clock: self.clock,
            metrics: OrchestratorMetrics::new(),
        });
        state.attach_source(Arc::clone(&context) as Arc<dyn StateSource>);
        context
    }
}

struct VisitSuccess {
    results: Vec<SearchResult>,
    response_time_ms: u64,
}

enum VisitFailure {
    Cancelled,
    Failed {
        error: Error,
        response_time_ms: u64,
    },
}

/// The per-call decision engine: selection, dispatch, retry, fallback, and
/// result packaging. Safe to share and invoke concurrently.
pub struct SearchOrchestrator {
    ctx: Arc<OrchestratorContext>,
}

impl SearchOrchestrator {
    pub fn new(ctx: Arc<OrchestratorContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<OrchestratorContext> {
        &self.ctx
    }

    /// Orchestrated search over the `search` category.
    pub async fn unified_search(&self, params: SearchParams) -> UnifiedResult {
        self.dispatch(params, ProviderCategory::Search, CancellationToken::new())
            .await
    }

    /// As [`Self::unified_search`], honoring an external cancellation signal.
    pub async fn unified_search_with_cancel(
        &self,
        params: SearchParams,
        cancel: CancellationToken,
    ) -> UnifiedResult {
        self.dispatch(params, ProviderCategory::Search, cancel).await
    }

    /// Orchestrated search over the `ai_response` category. Uses adaptive
    /// ranking and priority order only; the analyzer recommendation is not
    /// consulted.
    pub async fn unified_ai_search(&self, params: SearchParams) -> UnifiedResult {
        self.dispatch(params, ProviderCategory::AiResponse, CancellationToken::new())
            .await
    }

    pub async fn unified_ai_search_with_cancel(
        &self,
        params: SearchParams,
        cancel: CancellationToken,
    ) -> UnifiedResult {
        self.dispatch(params, ProviderCategory::AiResponse, cancel)
            .await
    }

    /// Dispatch to a single named provider with retries but no fallback.
    /// This is the direct-mode path.
    pub async fn search_provider(&self, provider: &str, params: &SearchParams) -> UnifiedResult {
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let characteristics = self.ctx.analyzer.analyze(&params.query);

        if !self.ctx.health.is_available(provider).await {
            return UnifiedResult::failure(
                format!("Provider {} is not available", provider),
                Vec::new(),
                elapsed_ms(started),
            );
        }

        match self.visit_provider(provider, params, &cancel).await {
            Ok(success) => {
                self.record_success(provider, params, &characteristics, &success)
                    .await;
                UnifiedResult {
                    results: success.results,
                    provider_used: provider.to_string(),
                    fallback_attempts: Vec::new(),
                    total_time_ms: elapsed_ms(started),
                    success: true,
                    error: None,
                    query_analysis: None,
                }
            }
            Err(VisitFailure::Cancelled) => {
                UnifiedResult::failure("cancelled", Vec::new(), elapsed_ms(started))
            }
            Err(VisitFailure::Failed {
                error,
                response_time_ms,
            }) => {
                self.record_failure(provider, params, &characteristics, &error, response_time_ms)
                    .await;
                UnifiedResult::failure(error.to_string(), vec![provider.to_string()], elapsed_ms(started))
            }
        }
    }

    async fn dispatch(
        &self,
        params: SearchParams,
        category: ProviderCategory,
        cancel: CancellationToken,
    ) -> UnifiedResult {
        let started = Instant::now();
        let ctx = &self.ctx;

        if let Some(limit) = params.limit {
            if !(1..=50).contains(&limit) {
                return UnifiedResult::failure(
                    Error::invalid_argument(format!("limit {} out of range 1..=50", limit))
                        .to_string(),
                    Vec::new(),
                    elapsed_ms(started),
                );
            }
        }

        let characteristics = ctx.analyzer.analyze(&params.query);
        let available = ctx.health.available_providers(category).await;
        if available.is_empty() {
            warn!(%category, "no providers available");
            return UnifiedResult::failure(
                Error::NoProviders { category }.to_string(),
                Vec::new(),
                elapsed_ms(started),
            );
        }

        let recommendation = match category {
            ProviderCategory::Search => Some(ctx.analyzer.recommend(&characteristics, &available)),
            ProviderCategory::AiResponse => None,
        };
        let adaptive = ctx
            .tracker
            .adaptive_ranking(Some(&characteristics), &available)
            .await;
        let order = combine_ranking(recommendation.as_ref(), adaptive, &available);
        debug!(?order, %category, "dispatch order resolved");
        if let Some(first) = order.first() {
            let gated = recommendation
                .as_ref()
                .is_some_and(|r| r.confidence > CONFIDENCE_GATE && r.provider == *first);
            ctx.metrics
                .record_selection(first, if gated { "recommended" } else { "adaptive" });
        }

        let fallback_enabled = ctx.config.fallback_enabled();
        let fallback_delay = Duration::from_millis(ctx.config.fallback_delay_ms());
        let mut attempted: Vec<String> = Vec::new();

        for (index, provider) in order.iter().enumerate() {
            if index > 0 {
                if !fallback_enabled {
                    break;
                }
                if !sleep_unless_cancelled(fallback_delay, &cancel).await {
                    return self.cancelled(attempted, started);
                }
            }

            match self.visit_provider(provider, &params, &cancel).await {
                Ok(success) => {
                    self.record_success(provider, &params, &characteristics, &success)
                        .await;
                    ctx.metrics
                        .record_fallback_depth(&category.to_string(), attempted.len());
                    info!(
                        provider,
                        results = success.results.len(),
                        fallbacks = attempted.len(),
                        "search resolved"
                    );
                    return UnifiedResult {
                        results: success.results,
                        provider_used: provider.clone(),
                        fallback_attempts: attempted,
                        total_time_ms: elapsed_ms(started),
                        success: true,
                        error: None,
                        query_analysis: recommendation.as_ref().map(|rec| QueryAnalysis {
                            query_type: characteristics.query_type,
                            recommended_provider: rec.provider.clone(),
                            confidence: rec.confidence,
                            reasoning: rec.reasoning.clone(),
                        }),
                    };
                }
                Err(VisitFailure::Cancelled) => return self.cancelled(attempted, started),
                Err(VisitFailure::Failed {
                    error,
                    response_time_ms,
                }) => {
                    warn!(provider, error = %error, "provider failed, continuing fallback");
                    attempted.push(provider.clone());
                    self.record_failure(provider, &params, &characteristics, &error, response_time_ms)
                        .await;
                    ctx.metrics
                        .record_outcome(provider, &category.to_string(), "failure");
                }
            }
        }

        ctx.metrics
            .record_fallback_depth(&category.to_string(), attempted.len());
        UnifiedResult::failure(
            format!("All {} {} providers failed", attempted.len(), category),
            attempted,
            elapsed_ms(started),
        )
    }

    /// One provider visit: up to `max_retries` inner retries with
    /// exponential backoff, each attempt racing a per-call deadline and the
    /// caller's cancellation token.
    async fn visit_provider(
        &self,
        provider: &str,
        params: &SearchParams,
        cancel: &CancellationToken,
    ) -> std::result::Result<VisitSuccess, VisitFailure> {
        let settings = self.ctx.config.provider_settings(provider);
        let searcher = match self.ctx.registry.get(provider) {
            Ok(searcher) => searcher,
            Err(e) => {
                return Err(VisitFailure::Failed {
                    error: Error::provider(ErrorKind::ProviderError, provider, e.to_string()),
                    response_time_ms: 0,
                });
            }
        };

        let mut attempt: u32 = 0;
        loop {
            let attempt_started = Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(VisitFailure::Cancelled),
                outcome = tokio::time::timeout(
                    Duration::from_millis(settings.timeout_ms),
                    searcher.search(params),
                ) => outcome,
            };
            let response_time_ms = elapsed_ms(attempt_started);

            let error = match outcome {
                Ok(Ok(results)) => {
                    return Ok(VisitSuccess {
                        results,
                        response_time_ms,
                    });
                }
                Ok(Err(error)) => error,
                Err(_) => Error::timeout(provider, settings.timeout_ms),
            };

            let kind = error.kind().unwrap_or(ErrorKind::ApiError);
            if !kind.is_retryable() || attempt >= settings.max_retries {
                return Err(VisitFailure::Failed {
                    error,
                    response_time_ms,
                });
            }

            let backoff = Duration::from_millis(
                RETRY_BASE_DELAY_MS
                    .saturating_mul(1u64 << attempt.min(31))
                    .min(RETRY_MAX_DELAY_MS),
            );
            debug!(provider, attempt, backoff_ms = backoff.as_millis() as u64, "retrying");
            if !sleep_unless_cancelled(backoff, cancel).await {
                return Err(VisitFailure::Cancelled);
            }
            attempt += 1;
        }
    }

    async fn record_success(
        &self,
        provider: &str,
        params: &SearchParams,
        characteristics: &QueryCharacteristics,
        success: &VisitSuccess,
    ) {
        let ctx = &self.ctx;
        ctx.health.record_success(provider).await;
        ctx.tracker
            .record_query_result(QueryPerformanceRecord {
                query: params.query.clone(),
                characteristics: characteristics.clone(),
                provider_used: provider.to_string(),
                success: true,
                response_time_ms: success.response_time_ms,
                result_count: success.results.len(),
                timestamp: ctx.clock.now(),
                error_kind: None,
                user_feedback: None,
            })
            .await;
        let category = ctx
            .registry
            .category_of(provider)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        ctx.metrics.record_outcome(provider, &category, "success");
        ctx.metrics
            .record_response_time(provider, success.response_time_ms as f64 / 1000.0);
    }

    async fn record_failure(
        &self,
        provider: &str,
        params: &SearchParams,
        characteristics: &QueryCharacteristics,
        error: &Error,
        response_time_ms: u64,
    ) {
        let ctx = &self.ctx;
        ctx.health.record_failure(provider, error).await;
        ctx.tracker
            .record_query_result(QueryPerformanceRecord {
                query: params.query.clone(),
                characteristics: characteristics.clone(),
                provider_used: provider.to_string(),
                success: false,
                response_time_ms,
                result_count: 0,
                timestamp: ctx.clock.now(),
                error_kind: Some(error.kind().unwrap_or(ErrorKind::ApiError)),
                user_feedback: None,
            })
            .await;
    }

    fn cancelled(&self, attempted: Vec<String>, started: Instant) -> UnifiedResult {
        UnifiedResult::failure("cancelled", attempted, elapsed_ms(started))
    }
}

/// Put a confidently recommended, still-available provider first; otherwise
/// the adaptive ranking stands unchanged.
fn combine_ranking(
    recommendation: Option<&Recommendation>,
    adaptive: Vec<String>,
    available: &[String],
) -> Vec<String> {
    if let Some(rec) = recommendation {
        if !rec.provider.is_empty()
            && rec.confidence > CONFIDENCE_GATE
            && available.contains(&rec.provider)
        {
            let mut order = Vec::with_capacity(adaptive.len());
            order.push(rec.provider.clone());
            order.extend(adaptive.into_iter().filter(|p| *p != rec.provider));
            return order;
        }
    }
    adaptive
}

async fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
