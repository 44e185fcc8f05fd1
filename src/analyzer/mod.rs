//! Query analysis: deterministic feature extraction and provider scoring.
//!
//! Everything in this module is a pure function of the query string (plus
//! the static tables in [`indicators`] and [`capabilities`]), so analysis
//! output is byte-identical across runs and processes.

pub mod capabilities;
pub mod indicators;

use capabilities::{DEFAULT_CAPABILITIES, capabilities_for};
use indicators::{
    CONJUNCTIONS, COMPARATIVES, INVESTIGATIVE_CUES, OPERATOR_PREFIXES, QUERY_TYPE_INDICATORS,
    RECENCY_CUES, STOP_WORDS, TROUBLESHOOT_CUES, domain_regex, year_regex,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Classified query type. Declaration order is the classification tie-break
/// order and must stay aligned with `QUERY_TYPE_INDICATORS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Factual,
    Technical,
    Academic,
    CurrentEvents,
    Code,
    General,
    Local,
    Product,
    Definition,
    HowTo,
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueryType::Factual => "factual",
            QueryType::Technical => "technical",
            QueryType::Academic => "academic",
            QueryType::CurrentEvents => "current_events",
            QueryType::Code => "code",
            QueryType::General => "general",
            QueryType::Local => "local",
            QueryType::Product => "product",
            QueryType::Definition => "definition",
            QueryType::HowTo => "how_to",
        };
        write!(f, "{}", name)
    }
}

/// Query complexity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Coarse sentiment of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Neutral,
    Investigative,
    Comparative,
}

/// Derived intent, used for reporting and downstream heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Troubleshoot,
    CompareOptions,
    Learn,
    Define,
    Purchase,
    Navigate,
    Research,
    FindInformation,
}

/// Feature vector extracted from a raw query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCharacteristics {
    pub query_type: QueryType,
    /// Hostnames mentioned in the query, deduplicated, in order of first
    /// appearance.
    pub domains_mentioned: Vec<String>,
    pub requires_recency: bool,
    pub complexity: Complexity,
    pub has_operators: bool,
    pub sentiment: Sentiment,
    pub likely_intent: Intent,
    /// Deduplicated content words, stop-words removed, insertion order.
    pub keywords: Vec<String>,
}

/// One provider's score against a characteristics vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderScore {
    pub provider: String,
    pub score: f64,
    pub reasons: Vec<String>,
}

/// The analyzer's single best pick for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub provider: String,
    /// Clamped to [0, 100].
    pub confidence: f64,
    pub reasoning: String,
    /// Up to two runner-up provider names.
    pub alternatives: Vec<String>,
}

/// Deterministic query classifier and provider scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryAnalyzer;

impl QueryAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Extract the full feature vector for a query.
    pub fn analyze(&self, query: &str) -> QueryCharacteristics {
        let lower = query.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();

        let query_type = classify(&lower);
        let complexity = complexity_of(&lower, &words);
        let sentiment = sentiment_of(&lower, &words);
        let characteristics = QueryCharacteristics {
            query_type,
            domains_mentioned: extract_domains(&lower),
            requires_recency: requires_recency(&lower),
            complexity,
            has_operators: has_operators(&lower),
            sentiment,
            likely_intent: derive_intent(&lower, query_type, sentiment),
            keywords: extract_keywords(&words),
        };
        debug!(
            query_type = %characteristics.query_type,
            complexity = ?characteristics.complexity,
            "analyzed query"
        );
        characteristics
    }

    /// Score each candidate provider against a characteristics vector,
    /// highest first. Ties keep the candidate input order.
    pub fn score_providers(
        &self,
        characteristics: &QueryCharacteristics,
        candidates: &[String],
    ) -> Vec<ProviderScore> {
        let mut scored: Vec<ProviderScore> = candidates
            .iter()
            .map(|name| score_provider(name, characteristics))
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    /// Pick the top-scored candidate, with confidence and alternatives.
    pub fn recommend(
        &self,
        characteristics: &QueryCharacteristics,
        candidates: &[String],
    ) -> Recommendation {
        let scored = self.score_providers(characteristics, candidates);
        match scored.first() {
            Some(top) => Recommendation {
                provider: top.provider.clone(),
                confidence: top.score.clamp(0.0, 100.0),
                reasoning: top.reasons.join("; "),
                alternatives: scored
                    .iter()
                    .skip(1)
                    .take(2)
                    .map(|s| s.provider.clone())
                    .collect(),
            },
            None => Recommendation {
                provider: String::new(),
                confidence: 0.0,
                reasoning: String::new(),
                alternatives: Vec::new(),
            },
        }
    }
}

/// Pick the query type with the highest indicator score; ties resolve to
/// the earliest declared type, zero everywhere resolves to `General`.
fn classify(lower: &str) -> QueryType {
    let mut best = QueryType::General;
    let mut best_score = 0usize;
    for (query_type, phrases) in QUERY_TYPE_INDICATORS {
        let score: usize = phrases
            .iter()
            .filter(|phrase| lower.contains(*phrase))
            .map(|phrase| phrase.split_whitespace().count())
            .sum();
        if score > best_score {
            best = *query_type;
            best_score = score;
        }
    }
    best
}

fn complexity_of(lower: &str, words: &[&str]) -> Complexity {
    let mut score = match words.len() {
        n if n > 15 => 2,
        n if n > 8 => 1,
        _ => 0,
    };
    if words.iter().any(|w| CONJUNCTIONS.contains(&trim_token(w))) {
        score += 1;
    }
    if words.iter().any(|w| COMPARATIVES.contains(&trim_token(w))) {
        score += 1;
    }
    if lower.matches('?').count() >= 2 {
        score += 2;
    }
    match score {
        n if n >= 3 => Complexity::Complex,
        n if n >= 1 => Complexity::Moderate,
        _ => Complexity::Simple,
    }
}

fn sentiment_of(lower: &str, words: &[&str]) -> Sentiment {
    let comparative = words.iter().any(|w| COMPARATIVES.contains(&trim_token(w)))
        || lower.contains("difference between");
    if comparative {
        return Sentiment::Comparative;
    }
    if INVESTIGATIVE_CUES.iter().any(|cue| lower.contains(cue)) {
        return Sentiment::Investigative;
    }
    Sentiment::Neutral
}

fn derive_intent(lower: &str, query_type: QueryType, sentiment: Sentiment) -> Intent {
    if sentiment == Sentiment::Comparative {
        return Intent::CompareOptions;
    }
    if TROUBLESHOOT_CUES.iter().any(|cue| lower.contains(cue)) {
        return Intent::Troubleshoot;
    }
    match query_type {
        QueryType::HowTo => Intent::Learn,
        QueryType::Definition => Intent::Define,
        QueryType::Product => Intent::Purchase,
        QueryType::Local => Intent::Navigate,
        QueryType::Academic => Intent::Research,
        QueryType::CurrentEvents if sentiment == Sentiment::Investigative => Intent::Research,
        _ => Intent::FindInformation,
    }
}

fn extract_domains(lower: &str) -> Vec<String> {
    let mut domains = Vec::new();
    for m in domain_regex().find_iter(lower) {
        let domain = m.as_str().to_string();
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }
    domains
}

fn requires_recency(lower: &str) -> bool {
    RECENCY_CUES.iter().any(|cue| lower.contains(cue)) || year_regex().is_match(lower)
}

fn has_operators(lower: &str) -> bool {
    OPERATOR_PREFIXES.iter().any(|op| lower.contains(op)) || lower.matches('"').count() >= 2
}

fn extract_keywords(words: &[&str]) -> Vec<String> {
    let mut keywords = Vec::new();
    for word in words {
        let token = trim_token(word);
        if token.len() > 2
            && !STOP_WORDS.contains(&token)
            && !keywords.iter().any(|k: &String| k.as_str() == token)
        {
            keywords.push(token.to_string());
        }
    }
    keywords
}

/// Strip edge punctuation so "vs." and "(better)" match as standalone words.
fn trim_token(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

fn score_provider(name: &str, c: &QueryCharacteristics) -> ProviderScore {
    let caps = capabilities_for(name).unwrap_or(&DEFAULT_CAPABILITIES);
    let mut score = 50.0;
    let mut reasons = Vec::new();

    if caps.strong_for.contains(&c.query_type) {
        score += 30.0;
        reasons.push(format!("Excellent for {} queries", c.query_type));
    } else if c.query_type == QueryType::General {
        score += 10.0;
    }

    if c.complexity == Complexity::Complex && caps.complexity_handling >= 0.9 {
        score += 20.0;
        reasons.push("Handles complex queries well".to_string());
    }
    if c.complexity == Complexity::Simple && caps.fast_response {
        score += 15.0;
        reasons.push("Fast for simple queries".to_string());
    }
    if c.requires_recency && caps.recency_score >= 0.8 {
        score += 20.0;
        reasons.push("Good with recent information".to_string());
    }
    if c.has_operators && caps.operator_support >= 0.8 {
        score += 15.0;
        reasons.push("Strong operator support".to_string());
    }
    if let Some(domain) = c.domains_mentioned.iter().find(|d| {
        caps.good_with_domains
            .iter()
            .any(|g| *g == "*" || d.contains(g))
    }) {
        score += 10.0;
        reasons.push(format!("Good with {}", domain));
    }
    if caps.ai_powered && c.complexity == Complexity::Complex {
        score += 10.0;
        reasons.push("AI-powered analysis".to_string());
    }
    if caps.privacy_focused && c.query_type != QueryType::Academic {
        score += 5.0;
        reasons.push("Privacy-focused".to_string());
    }
    if caps.no_ads && c.query_type == QueryType::Technical {
        score += 10.0;
        reasons.push("No ads, clean results".to_string());
    }

    ProviderScore {
        provider: name.to_string(),
        score,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn analysis_is_deterministic() {
        let analyzer = QueryAnalyzer::new();
        let query = "latest AI research papers 2024";
        assert_eq!(analyzer.analyze(query), analyzer.analyze(query));
        let a = serde_json::to_string(&analyzer.analyze(query)).unwrap();
        let b = serde_json::to_string(&analyzer.analyze(query)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn websocket_auth_query_classifies_technical_and_prefers_kagi() {
        let analyzer = QueryAnalyzer::new();
        let c = analyzer.analyze("how to implement WebSocket authentication in Node.js");
        assert_eq!(c.query_type, QueryType::Technical);
        assert_eq!(c.domains_mentioned, vec!["node.js".to_string()]);
        assert!(!c.has_operators);

        let rec = analyzer.recommend(&c, &candidates(&["tavily", "kagi", "brave"]));
        assert_eq!(rec.provider, "kagi");
        assert!(rec.confidence >= 95.0, "confidence was {}", rec.confidence);
        assert!(rec.reasoning.contains("No ads, clean results"));
    }

    #[test]
    fn academic_recency_query_prefers_tavily() {
        let analyzer = QueryAnalyzer::new();
        let c = analyzer.analyze("latest AI research papers 2024");
        assert_eq!(c.query_type, QueryType::Academic);
        assert!(c.requires_recency);

        let rec = analyzer.recommend(&c, &candidates(&["tavily", "kagi", "brave"]));
        assert_eq!(rec.provider, "tavily");
        assert!(rec.reasoning.contains("Good with recent information"));
        assert_eq!(rec.alternatives.len(), 2);
    }

    #[test]
    fn unmatched_queries_fall_back_to_general() {
        let analyzer = QueryAnalyzer::new();
        let c = analyzer.analyze("pelican migration patterns");
        assert_eq!(c.query_type, QueryType::General);
    }

    #[test]
    fn complexity_bands_follow_word_count_and_structure() {
        let analyzer = QueryAnalyzer::new();
        assert_eq!(analyzer.analyze("weather berlin").complexity, Complexity::Simple);
        assert_eq!(
            analyzer.analyze("rust async runtime tokio").complexity,
            Complexity::Simple
        );
        // conjunction alone lifts to moderate
        assert_eq!(
            analyzer.analyze("coffee with milk").complexity,
            Complexity::Moderate
        );
        // comparative + conjunction + two questions = complex
        assert_eq!(
            analyzer
                .analyze("is postgres better than mysql? and which scales harder?")
                .complexity,
            Complexity::Complex
        );
        // long queries climb one band by length
        assert_eq!(
            analyzer
                .analyze("one two three four five six seven eight nine ten")
                .complexity,
            Complexity::Moderate
        );
    }

    #[test]
    fn domains_are_deduplicated_and_prefixes_ignored() {
        let analyzer = QueryAnalyzer::new();
        let c = analyzer.analyze("site:github.com rust issues on github.com from:docs.rs");
        assert_eq!(
            c.domains_mentioned,
            vec!["github.com".to_string(), "docs.rs".to_string()]
        );
        assert!(c.has_operators);
    }

    #[test]
    fn quoted_phrases_count_as_operators() {
        let analyzer = QueryAnalyzer::new();
        assert!(analyzer.analyze("\"exact phrase\" search").has_operators);
        assert!(!analyzer.analyze("plain search").has_operators);
    }

    #[test]
    fn keywords_drop_stop_words_and_duplicates() {
        let analyzer = QueryAnalyzer::new();
        let c = analyzer.analyze("the rust borrow checker and the rust compiler");
        assert_eq!(
            c.keywords,
            vec![
                "rust".to_string(),
                "borrow".to_string(),
                "checker".to_string(),
                "compiler".to_string()
            ]
        );
    }

    #[test]
    fn comparative_queries_get_compare_intent() {
        let analyzer = QueryAnalyzer::new();
        let c = analyzer.analyze("postgres vs mysql for analytics");
        assert_eq!(c.sentiment, Sentiment::Comparative);
        assert_eq!(c.likely_intent, Intent::CompareOptions);
    }

    #[test]
    fn error_queries_get_troubleshoot_intent() {
        let analyzer = QueryAnalyzer::new();
        let c = analyzer.analyze("segfault error when linking openssl");
        assert_eq!(c.likely_intent, Intent::Troubleshoot);
    }

    #[test]
    fn empty_candidate_set_yields_zero_confidence() {
        let analyzer = QueryAnalyzer::new();
        let c = analyzer.analyze("anything");
        let rec = analyzer.recommend(&c, &[]);
        assert_eq!(rec.provider, "");
        assert_eq!(rec.confidence, 0.0);
        assert!(rec.alternatives.is_empty());
    }

    #[test]
    fn general_type_gives_small_bonus_to_non_specialists() {
        let analyzer = QueryAnalyzer::new();
        let c = analyzer.analyze("pelican migration patterns");
        let scores = analyzer.score_providers(&c, &candidates(&["perplexity"]));
        // base 50 + 10 general (perplexity not strong for general)
        assert_eq!(scores[0].score, 60.0);
    }

    #[test]
    fn score_ties_preserve_candidate_order() {
        let analyzer = QueryAnalyzer::new();
        let c = analyzer.analyze("pelican migration patterns");
        // two unknown providers score identically; input order must hold
        let scores = analyzer.score_providers(&c, &candidates(&["zeta", "alpha"]));
        assert_eq!(scores[0].provider, "zeta");
        assert_eq!(scores[1].provider, "alpha");
    }
}
