//! Per-provider health state machine.
//!
//! Events are outcome notifications from the orchestrator; the state is the
//! record itself. Cooldowns and the circuit breaker use lazy timer
//! semantics: nothing runs in the background, lapsed timestamps are cleared
//! on the next availability check.

use crate::domain::error::{Error, ErrorKind};
use crate::domain::ports::Clock;
use crate::domain::types::ProviderCategory;
use crate::infrastructure::config::ProviderConfigManager;
use crate::infrastructure::metrics::OrchestratorMetrics;
use crate::infrastructure::registry::ProviderRegistry;
use crate::infrastructure::state::StateManager;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Window after a success during which accumulated failures decay.
pub const FAILURE_RESET_MINUTES: i64 = 30;

const RATE_LIMIT_DEFAULT_COOLDOWN_HOURS: i64 = 1;
const CREDIT_EXHAUSTED_COOLDOWN_HOURS: i64 = 24;

/// Last failure seen for a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Health record for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealthRecord {
    pub available: bool,
    pub failure_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limited_until: Option<DateTime<Utc>>,
    pub circuit_breaker_open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_open_until: Option<DateTime<Utc>>,
}

impl Default for ProviderHealthRecord {
    fn default() -> Self {
        Self {
            available: true,
            failure_count: 0,
            last_success: None,
            last_error: None,
            rate_limited_until: None,
            circuit_breaker_open: false,
            circuit_breaker_open_until: None,
        }
    }
}

/// Shared health manager; one coarse lock over all provider records.
pub struct ProviderHealthManager {
    records: RwLock<HashMap<String, ProviderHealthRecord>>,
    registry: Arc<ProviderRegistry>,
    config: Arc<ProviderConfigManager>,
    state: Arc<StateManager>,
    clock: Arc<dyn Clock>,
    metrics: OrchestratorMetrics,
}

impl ProviderHealthManager {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        config: Arc<ProviderConfigManager>,
        state: Arc<StateManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_records(registry, config, state, clock, HashMap::new())
    }

    /// Seed the manager from a persisted snapshot.
    pub fn with_records(
        registry: Arc<ProviderRegistry>,
        config: Arc<ProviderConfigManager>,
        state: Arc<StateManager>,
        clock: Arc<dyn Clock>,
        records: HashMap<String, ProviderHealthRecord>,
    ) -> Self {
        Self {
            records: RwLock::new(records),
            registry,
            config,
            state,
            clock,
            metrics: OrchestratorMetrics::new(),
        }
    }

    /// Success: full reset of failure state, availability restored.
    pub async fn record_success(&self, provider: &str) {
        let now = self.clock.now();
        {
            let mut records = self.records.write().await;
            let record = records.entry(provider.to_string()).or_default();
            record.last_error = None;
            record.rate_limited_until = None;
            record.circuit_breaker_open = false;
            record.circuit_breaker_open_until = None;
            record.failure_count = 0;
            record.available = true;
            record.last_success = Some(now);
        }
        self.metrics.record_breaker_state(provider, false);
        self.state.schedule_save();
    }

    /// Failure: classify the error kind and advance the state machine.
    pub async fn record_failure(&self, provider: &str, error: &Error) {
        let now = self.clock.now();
        let kind = error.kind().unwrap_or(ErrorKind::ApiError);
        let message = error_message(error);
        let threshold = self.config.circuit_breaker_threshold();
        let breaker_timeout = Duration::milliseconds(self.config.circuit_breaker_timeout_ms() as i64);

        let mut breaker_opened = false;
        {
            let mut records = self.records.write().await;
            let record = records.entry(provider.to_string()).or_default();
            record.last_error = Some(LastError {
                kind,
                message: message.clone(),
                details: None,
            });

            match kind {
                ErrorKind::RateLimit => {
                    let until = error
                        .retry_after()
                        .unwrap_or(now + Duration::hours(RATE_LIMIT_DEFAULT_COOLDOWN_HOURS));
                    record.rate_limited_until = Some(until);
                    record.available = false;
                    warn!(provider, %until, "provider rate limited");
                }
                ErrorKind::CreditExhausted | ErrorKind::QuotaExceeded => {
                    let until = now + Duration::hours(CREDIT_EXHAUSTED_COOLDOWN_HOURS);
                    record.rate_limited_until = Some(until);
                    record.available = false;
                    warn!(provider, %until, "provider credits exhausted");
                }
                ErrorKind::AuthenticationError => {
                    record.available = false;
                    warn!(provider, "authentication failure, provider disabled until manual reset");
                }
                ErrorKind::ProviderError | ErrorKind::Timeout => {
                    record.failure_count += 1;
                    if record.failure_count >= threshold {
                        open_breaker(record, now, breaker_timeout);
                        breaker_opened = true;
                    }
                }
                ErrorKind::ApiError => match ErrorKind::classify_api_message(&message) {
                    Some(ErrorKind::CreditExhausted) => {
                        let until = now + Duration::hours(CREDIT_EXHAUSTED_COOLDOWN_HOURS);
                        record.rate_limited_until = Some(until);
                        record.available = false;
                        warn!(provider, %until, "api error reclassified as credit exhaustion");
                    }
                    Some(ErrorKind::AuthenticationError) => {
                        record.available = false;
                        warn!(provider, "api error reclassified as authentication failure");
                    }
                    _ => {
                        record.failure_count += 1;
                    }
                },
                ErrorKind::InvalidInput => {
                    // caller error, not a provider health signal
                }
            }
        }

        if breaker_opened {
            info!(provider, "circuit breaker opened");
            self.metrics.record_breaker_state(provider, true);
        }
        self.state.schedule_save();
    }

    /// Availability check with lazy expiry of lapsed cooldowns and breakers.
    pub async fn is_available(&self, provider: &str) -> bool {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let record = records.entry(provider.to_string()).or_default();
        let changed = expire_lapsed(record, now);
        let available = record.available
            && !record.circuit_breaker_open
            && record.rate_limited_until.is_none_or(|t| t <= now);
        drop(records);
        if changed {
            debug!(provider, "lapsed cooldown cleared");
            self.state.schedule_save();
        }
        available
    }

    /// Configured priority order for a category, filtered down to providers
    /// that are registered, enabled, and currently available.
    pub async fn available_providers(&self, category: ProviderCategory) -> Vec<String> {
        let mut available = Vec::new();
        for name in self.config.provider_order(category) {
            if self.registry.category_of(&name) != Some(category) {
                continue;
            }
            if !self.config.is_enabled(&name) {
                continue;
            }
            if self.is_available(&name).await {
                available.push(name);
            }
        }
        available
    }

    /// Manual reset: clears all failure state.
    pub async fn reset(&self, provider: &str) {
        {
            let mut records = self.records.write().await;
            records.insert(provider.to_string(), ProviderHealthRecord::default());
        }
        info!(provider, "provider health manually reset");
        self.metrics.record_breaker_state(provider, false);
        self.state.schedule_save();
    }

    /// Current record for one provider, if any outcome has been seen.
    pub async fn record(&self, provider: &str) -> Option<ProviderHealthRecord> {
        self.records.read().await.get(provider).cloned()
    }

    /// All records, for reporting and snapshot assembly.
    pub async fn all_records(&self) -> HashMap<String, ProviderHealthRecord> {
        self.records.read().await.clone()
    }
}

fn open_breaker(record: &mut ProviderHealthRecord, now: DateTime<Utc>, timeout: Duration) {
    record.circuit_breaker_open = true;
    record.circuit_breaker_open_until = Some(now + timeout);
    record.available = false;
}

/// Clear lapsed timers; returns whether the record changed.
fn expire_lapsed(record: &mut ProviderHealthRecord, now: DateTime<Utc>) -> bool {
    let mut changed = false;
    if let Some(until) = record.rate_limited_until {
        if now >= until {
            record.rate_limited_until = None;
            record.available = true;
            changed = true;
        }
    }
    if let Some(until) = record.circuit_breaker_open_until {
        if now >= until {
            record.circuit_breaker_open = false;
            record.circuit_breaker_open_until = None;
            record.failure_count = 0;
            record.available = true;
            changed = true;
        }
    }
    if record.failure_count > 0 {
        if let Some(last_success) = record.last_success {
            if now - last_success <= Duration::minutes(FAILURE_RESET_MINUTES) {
                record.failure_count /= 2;
                changed = true;
            }
        }
    }
    changed
}

fn error_message(error: &Error) -> String {
    match error {
        Error::Provider { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::NullSearcher;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::state::StateConfig;

    struct Fixture {
        health: ProviderHealthManager,
        clock: Arc<ManualClock>,
        config: Arc<ProviderConfigManager>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap().keep();
        let state = StateManager::new(StateConfig::standard().with_dir(dir));
        let config = Arc::new(ProviderConfigManager::new(Arc::clone(&state)));
        let registry = Arc::new(ProviderRegistry::new());
        for name in ["tavily", "brave", "kagi"] {
            registry
                .register(ProviderCategory::Search, Arc::new(NullSearcher::new(name)))
                .unwrap();
        }
        let clock = Arc::new(ManualClock::at_epoch());
        let health = ProviderHealthManager::new(
            registry,
            Arc::clone(&config),
            state,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        Fixture {
            health,
            clock,
            config,
        }
    }

    #[tokio::test]
    async fn rate_limit_cooldown_expires_at_the_reset_time() {
        let f = fixture();
        let reset = f.clock.now() + Duration::seconds(600);
        let err = Error::rate_limited("tavily", "429 Too Many Requests", Some(reset));
        f.health.record_failure("tavily", &err).await;

        assert!(!f.health.is_available("tavily").await);
        f.clock.advance(Duration::seconds(599));
        assert!(!f.health.is_available("tavily").await);
        f.clock.advance(Duration::seconds(1));
        assert!(f.health.is_available("tavily").await);

        // lapsed field is cleared by the availability check
        let record = f.health.record("tavily").await.unwrap();
        assert!(record.rate_limited_until.is_none());
        assert!(record.available);
    }

    #[tokio::test]
    async fn breaker_opens_exactly_at_the_threshold() {
        let f = fixture();
        let threshold = f.config.circuit_breaker_threshold();
        let err = Error::provider(ErrorKind::ProviderError, "kagi", "502 Bad Gateway");

        for _ in 0..threshold - 1 {
            f.health.record_failure("kagi", &err).await;
        }
        assert!(f.health.is_available("kagi").await);
        let record = f.health.record("kagi").await.unwrap();
        assert!(!record.circuit_breaker_open);

        f.health.record_failure("kagi", &err).await;
        assert!(!f.health.is_available("kagi").await);
        let record = f.health.record("kagi").await.unwrap();
        assert!(record.circuit_breaker_open);
        assert!(record.circuit_breaker_open_until.is_some());
    }

    #[tokio::test]
    async fn breaker_recovers_after_its_timeout_and_zeroes_failures() {
        let f = fixture();
        let err = Error::provider(ErrorKind::ProviderError, "kagi", "boom");
        for _ in 0..f.config.circuit_breaker_threshold() {
            f.health.record_failure("kagi", &err).await;
        }
        assert!(!f.health.is_available("kagi").await);

        f.clock
            .advance(Duration::milliseconds(f.config.circuit_breaker_timeout_ms() as i64));
        assert!(f.health.is_available("kagi").await);
        let record = f.health.record("kagi").await.unwrap();
        assert_eq!(record.failure_count, 0);
        assert!(!record.circuit_breaker_open);
    }

    #[tokio::test]
    async fn credit_exhaustion_cools_down_for_a_day_without_touching_failures() {
        let f = fixture();
        let err = Error::provider(ErrorKind::CreditExhausted, "tavily", "credits exhausted");
        f.health.record_failure("tavily", &err).await;

        assert!(!f.health.is_available("tavily").await);
        assert_eq!(f.health.record("tavily").await.unwrap().failure_count, 0);

        f.clock.advance(Duration::hours(23));
        assert!(!f.health.is_available("tavily").await);
        f.clock.advance(Duration::hours(1));
        assert!(f.health.is_available("tavily").await);
        assert_eq!(f.health.record("tavily").await.unwrap().failure_count, 0);
    }

    #[tokio::test]
    async fn auth_failures_need_a_manual_reset() {
        let f = fixture();
        let err = Error::provider(ErrorKind::AuthenticationError, "brave", "invalid key");
        f.health.record_failure("brave", &err).await;

        assert!(!f.health.is_available("brave").await);
        f.clock.advance(Duration::days(30));
        assert!(!f.health.is_available("brave").await);

        f.health.reset("brave").await;
        assert!(f.health.is_available("brave").await);
    }

    #[tokio::test]
    async fn unclassified_api_errors_use_message_heuristics() {
        let f = fixture();

        let quota = Error::provider(ErrorKind::ApiError, "tavily", "monthly quota reached");
        f.health.record_failure("tavily", &quota).await;
        assert!(!f.health.is_available("tavily").await);
        assert!(f.health.record("tavily").await.unwrap().rate_limited_until.is_some());

        let auth = Error::provider(ErrorKind::ApiError, "brave", "Invalid API key");
        f.health.record_failure("brave", &auth).await;
        assert!(!f.health.is_available("brave").await);

        let opaque = Error::provider(ErrorKind::ApiError, "kagi", "socket hang up");
        f.health.record_failure("kagi", &opaque).await;
        assert!(f.health.is_available("kagi").await);
        assert_eq!(f.health.record("kagi").await.unwrap().failure_count, 1);
    }

    #[tokio::test]
    async fn success_clears_all_failure_state() {
        let f = fixture();
        let err = Error::rate_limited("tavily", "429", None);
        f.health.record_failure("tavily", &err).await;
        assert!(!f.health.is_available("tavily").await);

        f.health.record_success("tavily").await;
        let record = f.health.record("tavily").await.unwrap();
        assert!(record.available);
        assert!(record.rate_limited_until.is_none());
        assert!(record.last_error.is_none());
        assert_eq!(record.failure_count, 0);
        assert_eq!(record.last_success, Some(f.clock.now()));
    }

    #[tokio::test]
    async fn failures_decay_after_a_recent_success() {
        let f = fixture();
        let err = Error::provider(ErrorKind::ProviderError, "kagi", "flaky");
        f.health.record_failure("kagi", &err).await;
        f.health.record_failure("kagi", &err).await;
        f.health.record_failure("kagi", &err).await;
        f.health.record_success("kagi").await;
        f.health.record_failure("kagi", &err).await;
        f.health.record_failure("kagi", &err).await;
        assert_eq!(f.health.record("kagi").await.unwrap().failure_count, 2);

        // success 10 minutes ago: the next availability check halves the count
        f.clock.advance(Duration::minutes(10));
        assert!(f.health.is_available("kagi").await);
        assert_eq!(f.health.record("kagi").await.unwrap().failure_count, 1);
    }

    #[tokio::test]
    async fn available_set_respects_order_enablement_and_health() {
        let f = fixture();
        // default search order: tavily, brave, kagi
        assert_eq!(
            f.health.available_providers(ProviderCategory::Search).await,
            vec!["tavily", "brave", "kagi"]
        );

        f.config.set_disabled_providers(vec!["brave".into()]);
        let err = Error::rate_limited("tavily", "429", None);
        f.health.record_failure("tavily", &err).await;

        assert_eq!(
            f.health.available_providers(ProviderCategory::Search).await,
            vec!["kagi"]
        );
        // unregistered names in the order are skipped entirely
        assert!(
            f.health
                .available_providers(ProviderCategory::AiResponse)
                .await
                .is_empty()
        );
    }
}
