//! Static capability descriptors for the standard back-ends.
//!
//! These tables are the scoring ground truth: selection quality depends on
//! the relative bonuses they unlock, so the values are fixed constants and
//! covered by tests rather than configuration.

use super::QueryType;

/// Declared strengths and capability flags for one provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderCapabilities {
    pub name: &'static str,
    /// Query types this provider is declared strong for.
    pub strong_for: &'static [QueryType],
    /// 0–1, how fresh its index or sources are.
    pub recency_score: f64,
    /// 0–1, how well it copes with complex multi-part queries.
    pub complexity_handling: f64,
    /// 0–1, support for search operators (`site:`, quoted phrases, ...).
    pub operator_support: f64,
    /// Domain affinities; `"*"` matches any mentioned domain, other entries
    /// match by substring.
    pub good_with_domains: &'static [&'static str],
    pub ai_powered: bool,
    pub privacy_focused: bool,
    pub no_ads: bool,
    pub fast_response: bool,
}

/// Capabilities assumed for providers missing from the static table.
pub const DEFAULT_CAPABILITIES: ProviderCapabilities = ProviderCapabilities {
    name: "",
    strong_for: &[],
    recency_score: 0.5,
    complexity_handling: 0.5,
    operator_support: 0.5,
    good_with_domains: &[],
    ai_powered: false,
    privacy_focused: false,
    no_ads: false,
    fast_response: false,
};

/// The standard back-end capability table.
pub const PROVIDER_CAPABILITIES: &[ProviderCapabilities] = &[
    ProviderCapabilities {
        name: "tavily",
        strong_for: &[
            QueryType::Factual,
            QueryType::Academic,
            QueryType::CurrentEvents,
        ],
        recency_score: 0.9,
        complexity_handling: 0.8,
        operator_support: 0.6,
        good_with_domains: &["*"],
        ai_powered: true,
        privacy_focused: false,
        no_ads: false,
        fast_response: false,
    },
    ProviderCapabilities {
        name: "brave",
        strong_for: &[QueryType::Local, QueryType::Product],
        recency_score: 0.7,
        complexity_handling: 0.6,
        operator_support: 0.9,
        good_with_domains: &[],
        ai_powered: false,
        privacy_focused: true,
        no_ads: false,
        fast_response: true,
    },
    ProviderCapabilities {
        name: "kagi",
        strong_for: &[QueryType::Technical, QueryType::Code, QueryType::Definition],
        recency_score: 0.7,
        complexity_handling: 0.9,
        operator_support: 0.9,
        good_with_domains: &["*"],
        ai_powered: false,
        privacy_focused: true,
        no_ads: true,
        fast_response: true,
    },
    ProviderCapabilities {
        name: "perplexity",
        strong_for: &[
            QueryType::CurrentEvents,
            QueryType::Factual,
            QueryType::HowTo,
        ],
        recency_score: 0.9,
        complexity_handling: 0.9,
        operator_support: 0.3,
        good_with_domains: &[],
        ai_powered: true,
        privacy_focused: false,
        no_ads: true,
        fast_response: false,
    },
    ProviderCapabilities {
        name: "kagi_fastgpt",
        strong_for: &[QueryType::Factual, QueryType::Definition],
        recency_score: 0.8,
        complexity_handling: 0.7,
        operator_support: 0.3,
        good_with_domains: &[],
        ai_powered: true,
        privacy_focused: true,
        no_ads: true,
        fast_response: true,
    },
];

/// Look up the static capabilities for a provider name.
pub fn capabilities_for(name: &str) -> Option<&'static ProviderCapabilities> {
    PROVIDER_CAPABILITIES.iter().find(|c| c.name == name)
}
