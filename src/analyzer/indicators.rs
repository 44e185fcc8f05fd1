//! Static lexical tables driving query classification.
//!
//! Indicator order inside each list is insignificant; the order of the
//! `(QueryType, ...)` pairs is the tie-break order for classification and
//! must stay aligned with the `QueryType` declaration order.

use super::QueryType;
use regex::Regex;
use std::sync::OnceLock;

/// Per-type indicator phrases. A matched indicator contributes its token
/// count to the type's score, so multi-word phrases outweigh single cues.
pub(crate) const QUERY_TYPE_INDICATORS: &[(QueryType, &[&str])] = &[
    (
        QueryType::Factual,
        &[
            "who is",
            "who was",
            "what is the",
            "when did",
            "when was",
            "where is",
            "how many",
            "how much",
            "how old",
            "how tall",
            "how far",
            "population of",
            "capital of",
            "distance between",
            "founded",
            "invented",
        ],
    ),
    (
        QueryType::Technical,
        &[
            "how to implement",
            "how to configure",
            "how to debug",
            "how to fix",
            "error",
            "exception",
            "stack trace",
            "not working",
            "api",
            "sdk",
            "framework",
            "library",
            "install",
            "deploy",
            "compile",
            "runtime",
            "database",
            "server",
            "docker",
            "kubernetes",
            "authentication",
            "websocket",
            "http",
            "json",
            "node.js",
            "python",
            "javascript",
            "typescript",
            "rust",
            "java",
        ],
    ),
    (
        QueryType::Academic,
        &[
            "research",
            "research papers",
            "papers",
            "paper on",
            "study",
            "studies",
            "journal",
            "peer reviewed",
            "peer-reviewed",
            "thesis",
            "dissertation",
            "citation",
            "academic",
            "scholar",
            "findings",
        ],
    ),
    (
        QueryType::CurrentEvents,
        &[
            "news",
            "latest news",
            "breaking",
            "headline",
            "headlines",
            "today's",
            "this week's",
            "announcement",
            "announced",
            "election",
            "stock price",
            "happening",
        ],
    ),
    (
        QueryType::Code,
        &[
            "code example",
            "example code",
            "snippet",
            "function to",
            "write a function",
            "write a script",
            "regex for",
            "algorithm for",
            "syntax for",
            "implement a",
            "leetcode",
            "pseudocode",
        ],
    ),
    // General carries no indicators; it is the zero-score fallback.
    (QueryType::General, &[]),
    (
        QueryType::Local,
        &[
            "near me",
            "nearby",
            "closest",
            "restaurant",
            "restaurants",
            "directions to",
            "open now",
            "in my area",
            "around here",
            "local",
        ],
    ),
    (
        QueryType::Product,
        &[
            "best",
            "review",
            "reviews",
            "price",
            "prices",
            "cheapest",
            "buy",
            "deal",
            "deals",
            "top 10",
            "alternatives to",
            "worth it",
        ],
    ),
    (
        QueryType::Definition,
        &[
            "what does",
            "meaning of",
            "define",
            "definition",
            "definition of",
            "stands for",
            "acronym",
            "terminology",
        ],
    ),
    (
        QueryType::HowTo,
        &[
            "how to",
            "how do i",
            "how can i",
            "step by step",
            "tutorial",
            "guide",
            "instructions",
            "walkthrough",
            "getting started",
        ],
    ),
];

/// Standalone conjunction words contributing to the complexity score.
pub(crate) const CONJUNCTIONS: &[&str] = &["and", "or", "but", "with", "without", "except"];

/// Standalone comparative words contributing to the complexity score and
/// the comparative sentiment.
pub(crate) const COMPARATIVES: &[&str] = &["vs", "versus", "compare", "better", "worse", "than"];

/// Substring cues marking a query as recency-sensitive.
pub(crate) const RECENCY_CUES: &[&str] = &[
    "latest",
    "recent",
    "recently",
    "today",
    "right now",
    "current",
    "currently",
    "news",
    "this week",
    "this month",
    "this year",
    "update",
    "updated",
    "upcoming",
];

/// Substring cues marking a query as investigative.
pub(crate) const INVESTIGATIVE_CUES: &[&str] = &[
    "why",
    "how does",
    "how did",
    "what causes",
    "what caused",
    "analyze",
    "analysis of",
    "investigate",
    "explain",
    "reason for",
];

/// Substring cues mapping a query to the troubleshoot intent.
pub(crate) const TROUBLESHOOT_CUES: &[&str] = &[
    "error",
    "fix",
    "issue",
    "problem",
    "not working",
    "fails",
    "failing",
    "crash",
    "crashes",
    "broken",
    "troubleshoot",
];

/// Search-engine operator prefixes recognized by `has_operators`.
pub(crate) const OPERATOR_PREFIXES: &[&str] =
    &["site:", "filetype:", "intitle:", "inurl:", "inanchor:", "ext:"];

/// Content-word filter applied during keyword extraction.
pub(crate) const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "nor", "but", "yet", "are", "was", "were", "been", "being", "have",
    "has", "had", "does", "did", "will", "would", "shall", "should", "may", "might", "must",
    "can", "could", "about", "into", "like", "through", "after", "over", "between", "out",
    "against", "during", "without", "before", "under", "around", "among", "this", "that",
    "these", "those", "its", "his", "her", "their", "our", "your", "what", "which", "who",
    "whom", "how", "when", "where", "why", "not", "too", "very", "just", "also", "with",
    "from", "they", "them", "you",
];

/// DNS-like hostname matcher. Leading selector prefixes (`site:`, `from:`,
/// `@`, `on `) fall outside the match, which is what "stripped" means here.
pub(crate) fn domain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b")
            .expect("domain regex is valid")
    })
}

/// Four-digit years of this century count as recency cues.
pub(crate) fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b20\d{2}\b").expect("year regex is valid"))
}
