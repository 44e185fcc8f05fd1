//! Provider configuration: operating mode, ordering, enablement, and
//! fallback/breaker parameters.
//!
//! Configuration is layered at startup: built-in defaults, then
//! `OMNISEARCH_*` environment overrides (invalid values are logged and
//! ignored, per variable), then any overrides persisted from earlier
//! runtime `configure_providers` calls. All runtime mutation goes through
//! the setter API, which records the override and schedules a snapshot
//! save.

use crate::domain::error::{Error, Result};
use crate::domain::types::ProviderCategory;
use crate::infrastructure::state::StateManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};
use validator::Validate;

/// How the front-end routes tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Callers address one provider at a time.
    Direct,
    /// Callers go through the orchestrated unified path.
    Unified,
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatingMode::Direct => write!(f, "direct"),
            OperatingMode::Unified => write!(f, "unified"),
        }
    }
}

impl FromStr for OperatingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(OperatingMode::Direct),
            "unified" => Ok(OperatingMode::Unified),
            other => Err(Error::invalid_argument(format!(
                "unknown mode '{}', expected 'direct' or 'unified'",
                other
            ))),
        }
    }
}

/// Per-provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub enabled: bool,
    /// Lower number = higher priority within a category order.
    pub priority: u32,
    /// Keywords that route a query here in direct mode.
    pub preferred_for: Vec<String>,
    pub max_retries: u32,
    pub timeout_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 100,
            preferred_for: Vec::new(),
            max_retries: 2,
            timeout_ms: 30_000,
        }
    }
}

/// The full orchestration configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct OrchestrationConfig {
    pub mode: OperatingMode,
    pub providers: HashMap<String, ProviderSettings>,
    pub search_order: Vec<String>,
    pub ai_response_order: Vec<String>,
    pub fallback_enabled: bool,
    #[validate(range(max = 10000))]
    pub fallback_delay_ms: u64,
    #[validate(range(min = 1, max = 20))]
    pub circuit_breaker_threshold: u32,
    #[validate(range(min = 10000, max = 3600000))]
    pub circuit_breaker_timeout_ms: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Unified,
            providers: HashMap::new(),
            search_order: vec!["tavily".into(), "brave".into(), "kagi".into()],
            ai_response_order: vec!["perplexity".into(), "kagi_fastgpt".into()],
            fallback_enabled: true,
            fallback_delay_ms: 500,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_ms: 300_000,
        }
    }
}

/// Runtime configuration mutations, persisted so they survive restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<OperatingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_order: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_response_order: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_providers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_enabled: Option<bool>,
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Shared configuration manager.
pub struct ProviderConfigManager {
    inner: RwLock<OrchestrationConfig>,
    overrides: RwLock<ConfigOverrides>,
    state: Arc<StateManager>,
}

impl ProviderConfigManager {
    /// Build from defaults plus process environment, then apply persisted
    /// runtime overrides.
    pub fn from_env(state: Arc<StateManager>, persisted: &ConfigOverrides) -> Self {
        let pairs: Vec<(String, String)> = std::env::vars().collect();
        Self::from_env_pairs(state, &pairs, persisted)
    }

    /// Same as [`Self::from_env`] but over an explicit variable list, so
    /// tests never mutate process environment.
    pub fn from_env_pairs(
        state: Arc<StateManager>,
        pairs: &[(String, String)],
        persisted: &ConfigOverrides,
    ) -> Self {
        let mut config = OrchestrationConfig::default();
        apply_env_pairs(&mut config, pairs);
        apply_overrides(&mut config, persisted);
        if let Err(e) = config.validate() {
            warn!(error = %e, "orchestration config failed validation, reverting to defaults");
            config = OrchestrationConfig::default();
        }
        Self {
            inner: RwLock::new(config),
            overrides: RwLock::new(persisted.clone()),
            state,
        }
    }

    pub fn new(state: Arc<StateManager>) -> Self {
        Self {
            inner: RwLock::new(OrchestrationConfig::default()),
            overrides: RwLock::new(ConfigOverrides::default()),
            state,
        }
    }

    // --- getters -----------------------------------------------------------

    pub fn mode(&self) -> OperatingMode {
        self.read().mode
    }

    pub fn fallback_enabled(&self) -> bool {
        self.read().fallback_enabled
    }

    pub fn fallback_delay_ms(&self) -> u64 {
        self.read().fallback_delay_ms
    }

    pub fn circuit_breaker_threshold(&self) -> u32 {
        self.read().circuit_breaker_threshold
    }

    pub fn circuit_breaker_timeout_ms(&self) -> u64 {
        self.read().circuit_breaker_timeout_ms
    }

    /// Configured priority order for a category.
    pub fn provider_order(&self, category: ProviderCategory) -> Vec<String> {
        let config = self.read();
        match category {
            ProviderCategory::Search => config.search_order.clone(),
            ProviderCategory::AiResponse => config.ai_response_order.clone(),
        }
    }

    pub fn is_enabled(&self, provider: &str) -> bool {
        self.read()
            .providers
            .get(provider)
            .map(|s| s.enabled)
            .unwrap_or(true)
    }

    /// Settings for a provider, falling back to defaults for providers
    /// without explicit entries.
    pub fn provider_settings(&self, provider: &str) -> ProviderSettings {
        self.read()
            .providers
            .get(provider)
            .cloned()
            .unwrap_or_default()
    }

    /// Full config snapshot for reporting.
    pub fn snapshot(&self) -> OrchestrationConfig {
        self.read().clone()
    }

    /// Current runtime overrides, for persistence.
    pub fn overrides(&self) -> ConfigOverrides {
        self.overrides.read().expect("config lock poisoned").clone()
    }

    /// First available provider whose `preferred_for` keywords match the
    /// query, else the first available provider.
    pub fn preferred_provider_for_query(&self, query: &str, available: &[String]) -> Option<String> {
        let lower = query.to_lowercase();
        let config = self.read();
        for name in available {
            if let Some(settings) = config.providers.get(name) {
                if settings
                    .preferred_for
                    .iter()
                    .any(|k| lower.contains(&k.to_lowercase()))
                {
                    return Some(name.clone());
                }
            }
        }
        available.first().cloned()
    }

    // --- setters (record override + schedule save) -------------------------

    pub fn set_mode(&self, mode: OperatingMode) {
        self.write().mode = mode;
        self.overrides_mut().mode = Some(mode);
        info!(%mode, "operating mode updated");
        self.state.schedule_save();
    }

    pub fn set_provider_order(&self, category: ProviderCategory, order: Vec<String>) {
        {
            let mut config = self.write();
            match category {
                ProviderCategory::Search => config.search_order = order.clone(),
                ProviderCategory::AiResponse => config.ai_response_order = order.clone(),
            }
        }
        let mut overrides = self.overrides_mut();
        match category {
            ProviderCategory::Search => overrides.search_order = Some(order),
            ProviderCategory::AiResponse => overrides.ai_response_order = Some(order),
        }
        drop(overrides);
        self.state.schedule_save();
    }

    /// Replace the disabled set: anything previously disabled and not named
    /// is re-enabled.
    pub fn set_disabled_providers(&self, disabled: Vec<String>) {
        {
            let mut config = self.write();
            for settings in config.providers.values_mut() {
                settings.enabled = true;
            }
            for name in &disabled {
                config.providers.entry(name.clone()).or_default().enabled = false;
            }
        }
        self.overrides_mut().disabled_providers = Some(disabled);
        self.state.schedule_save();
    }

    pub fn set_fallback_enabled(&self, enabled: bool) {
        self.write().fallback_enabled = enabled;
        self.overrides_mut().fallback_enabled = Some(enabled);
        self.state.schedule_save();
    }

    /// Upsert explicit settings for one provider.
    pub fn set_provider_settings(&self, provider: &str, settings: ProviderSettings) {
        self.write()
            .providers
            .insert(provider.to_string(), settings);
        self.state.schedule_save();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, OrchestrationConfig> {
        self.inner.read().expect("config lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, OrchestrationConfig> {
        self.inner.write().expect("config lock poisoned")
    }

    fn overrides_mut(&self) -> std::sync::RwLockWriteGuard<'_, ConfigOverrides> {
        self.overrides.write().expect("config lock poisoned")
    }
}

/// Apply persisted runtime overrides on top of a config.
fn apply_overrides(config: &mut OrchestrationConfig, overrides: &ConfigOverrides) {
    if let Some(mode) = overrides.mode {
        config.mode = mode;
    }
    if let Some(order) = &overrides.search_order {
        config.search_order = order.clone();
    }
    if let Some(order) = &overrides.ai_response_order {
        config.ai_response_order = order.clone();
    }
    if let Some(disabled) = &overrides.disabled_providers {
        for name in disabled {
            config.providers.entry(name.clone()).or_default().enabled = false;
        }
    }
    if let Some(enabled) = overrides.fallback_enabled {
        config.fallback_enabled = enabled;
    }
}

/// Apply `OMNISEARCH_*` environment variables. Invalid values are logged
/// and ignored, keeping the default for that field.
fn apply_env_pairs(config: &mut OrchestrationConfig, pairs: &[(String, String)]) {
    for (key, value) in pairs {
        match key.as_str() {
            "OMNISEARCH_MODE" => match value.parse::<OperatingMode>() {
                Ok(mode) => config.mode = mode,
                Err(e) => warn!(%key, %value, error = %e, "ignoring invalid value"),
            },
            "OMNISEARCH_PROVIDER_ORDER" => {
                config.search_order = parse_csv(value);
            }
            "OMNISEARCH_AI_PROVIDER_ORDER" => {
                config.ai_response_order = parse_csv(value);
            }
            "OMNISEARCH_DISABLED_PROVIDERS" => {
                for name in parse_csv(value) {
                    config.providers.entry(name).or_default().enabled = false;
                }
            }
            "OMNISEARCH_FALLBACK_ENABLED" => match parse_bool(value) {
                Some(enabled) => config.fallback_enabled = enabled,
                None => warn!(%key, %value, "ignoring invalid boolean"),
            },
            "OMNISEARCH_FALLBACK_DELAY_MS" => {
                if let Some(ms) = parse_ranged(key, value, 0, 10_000) {
                    config.fallback_delay_ms = ms;
                }
            }
            "OMNISEARCH_CIRCUIT_BREAKER_THRESHOLD" => {
                if let Some(threshold) = parse_ranged(key, value, 1, 20) {
                    config.circuit_breaker_threshold = threshold as u32;
                }
            }
            "OMNISEARCH_CIRCUIT_BREAKER_TIMEOUT_MS" => {
                if let Some(ms) = parse_ranged(key, value, 10_000, 3_600_000) {
                    config.circuit_breaker_timeout_ms = ms;
                }
            }
            _ => {}
        }
    }
}

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_ranged(key: &str, value: &str, min: u64, max: u64) -> Option<u64> {
    match value.trim().parse::<u64>() {
        Ok(n) if (min..=max).contains(&n) => Some(n),
        Ok(n) => {
            warn!(%key, n, min, max, "ignoring out-of-range value");
            None
        }
        Err(e) => {
            warn!(%key, %value, error = %e, "ignoring unparseable value");
            None
        }
    }
}
