//! Shared harness for orchestrator integration tests

use mcp_omnisearch::adapters::ScriptedSearcher;
use mcp_omnisearch::domain::ports::{Clock, Searcher};
use mcp_omnisearch::domain::error::Result;
use mcp_omnisearch::domain::types::{ProviderCategory, SearchParams, SearchResult};
use mcp_omnisearch::infrastructure::clock::ManualClock;
use mcp_omnisearch::infrastructure::state::StateConfig;
use mcp_omnisearch::routing::orchestrator::{ContextBuilder, OrchestratorContext, SearchOrchestrator};
use mcp_omnisearch::ProviderRegistry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Searcher whose call never completes; used to exercise deadlines and
/// cancellation.
pub struct HangingSearcher {
    name: String,
}

impl HangingSearcher {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Searcher for HangingSearcher {
    async fn search(&self, _params: &SearchParams) -> Result<Vec<SearchResult>> {
        std::future::pending::<()>().await;
        unreachable!("pending future resolved")
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "hanging searcher, never resolves"
    }
}

pub struct Harness {
    pub ctx: Arc<OrchestratorContext>,
    pub orchestrator: SearchOrchestrator,
    pub clock: Arc<ManualClock>,
    pub state_dir: PathBuf,
    scripted: HashMap<String, Arc<ScriptedSearcher>>,
}

impl Harness {
    /// Scripted provider handle registered by [`build`].
    pub fn provider(&self, name: &str) -> &ScriptedSearcher {
        self.scripted.get(name).expect("unknown scripted provider")
    }
}

pub struct HarnessBuilder {
    search: Vec<String>,
    ai: Vec<String>,
    hanging: Vec<(String, ProviderCategory)>,
    env: Vec<(String, String)>,
    state_dir: Option<PathBuf>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            search: Vec::new(),
            ai: Vec::new(),
            hanging: Vec::new(),
            env: Vec::new(),
            state_dir: None,
        }
    }

    /// Register scripted search providers, also setting the search order.
    pub fn search_providers(mut self, names: &[&str]) -> Self {
        self.search = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Register scripted ai-response providers, also setting the ai order.
    pub fn ai_providers(mut self, names: &[&str]) -> Self {
        self.ai = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Register a hanging provider; it must also appear in the matching
    /// order list to be dispatched.
    pub fn hanging_provider(mut self, name: &str, category: ProviderCategory) -> Self {
        self.hanging.push((name.to_string(), category));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn state_dir(mut self, dir: PathBuf) -> Self {
        self.state_dir = Some(dir);
        self
    }

    pub async fn build(self) -> Harness {
        init_tracing();
        let registry = Arc::new(ProviderRegistry::new());
        let mut scripted = HashMap::new();

        for name in &self.search {
            if self.hanging.iter().any(|(h, _)| h == name) {
                continue;
            }
            let searcher = Arc::new(ScriptedSearcher::new(name.clone()));
            registry
                .register(ProviderCategory::Search, Arc::clone(&searcher) as Arc<dyn Searcher>)
                .expect("register search provider");
            scripted.insert(name.clone(), searcher);
        }
        for name in &self.ai {
            if self.hanging.iter().any(|(h, _)| h == name) {
                continue;
            }
            let searcher = Arc::new(ScriptedSearcher::new(name.clone()));
            registry
                .register(
                    ProviderCategory::AiResponse,
                    Arc::clone(&searcher) as Arc<dyn Searcher>,
                )
                .expect("register ai provider");
            scripted.insert(name.clone(), searcher);
        }
        for (name, category) in &self.hanging {
            registry
                .register(*category, Arc::new(HangingSearcher::new(name.clone())))
                .expect("register hanging provider");
        }

        let state_dir = self
            .state_dir
            .unwrap_or_else(|| tempfile::tempdir().expect("tempdir").keep());
        let clock = Arc::new(ManualClock::at_epoch());

        let mut env = self.env;
        if !self.search.is_empty() {
            env.push(("OMNISEARCH_PROVIDER_ORDER".into(), self.search.join(",")));
        }
        if !self.ai.is_empty() {
            env.push(("OMNISEARCH_AI_PROVIDER_ORDER".into(), self.ai.join(",")));
        }
        // keep fallback instant unless a test overrides it
        if !env.iter().any(|(k, _)| k == "OMNISEARCH_FALLBACK_DELAY_MS") {
            env.push(("OMNISEARCH_FALLBACK_DELAY_MS".into(), "0".into()));
        }

        let ctx = ContextBuilder::new(registry)
            .with_state_config(StateConfig::standard().with_dir(state_dir.clone()))
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .with_env_pairs(env)
            .build()
            .await;

        Harness {
            orchestrator: SearchOrchestrator::new(Arc::clone(&ctx)),
            ctx,
            clock,
            state_dir,
            scripted,
        }
    }
}

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// `count` boilerplate results attributed to `provider`.
pub fn results(provider: &str, count: usize) -> Vec<SearchResult> {
    (0..count)
        .map(|i| SearchResult {
            title: format!("result {}", i),
            url: format!("https://example.com/{}/{}", provider, i),
            snippet: format!("snippet {}", i),
            score: Some(1.0 - i as f64 * 0.1),
            source_provider: provider.to_string(),
        })
        .collect()
}
