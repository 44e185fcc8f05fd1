//! Error handling types

use crate::domain::types::ProviderCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of provider-originated failures.
///
/// This is a closed set shared between adapters and the orchestrator: the
/// health manager keys its state transitions off the kind, and the dispatch
/// loop uses it to decide whether a retry can possibly succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed parameters (4xx-class); never retried.
    InvalidInput,
    /// Missing or invalid credentials; disables the provider until manual reset.
    AuthenticationError,
    /// Per-window quota exceeded; cooldown from the server-provided reset or 1 h.
    RateLimit,
    /// Account credits exhausted; 24 h cooldown.
    CreditExhausted,
    /// Account quota exhausted; 24 h cooldown.
    QuotaExceeded,
    /// Back-end internal failure (5xx-class); counts toward the circuit breaker.
    ProviderError,
    /// Catch-all for unclassified adapter errors; refined by message heuristics.
    ApiError,
    /// Per-attempt deadline hit; transient, treated like a provider error.
    Timeout,
}

impl ErrorKind {
    /// Whether an inner retry against the same provider can possibly succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::ProviderError | ErrorKind::ApiError | ErrorKind::Timeout
        )
    }

    /// Refine an unclassified API error from its message.
    ///
    /// Returns `Some(CreditExhausted)` for credit/quota/limit wording and
    /// `Some(AuthenticationError)` for invalid-key/unauthorized wording;
    /// `None` when the message gives nothing away.
    pub fn classify_api_message(message: &str) -> Option<ErrorKind> {
        let lower = message.to_lowercase();
        if lower.contains("credit") || lower.contains("quota") || lower.contains("limit") {
            Some(ErrorKind::CreditExhausted)
        } else if lower.contains("invalid api key") || lower.contains("unauthorized") {
            Some(ErrorKind::AuthenticationError)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::AuthenticationError => "AUTHENTICATION_ERROR",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::CreditExhausted => "CREDIT_EXHAUSTED",
            ErrorKind::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorKind::ProviderError => "PROVIDER_ERROR",
            ErrorKind::ApiError => "API_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
        };
        write!(f, "{}", name)
    }
}

/// Main error type for the search orchestration core
#[derive(Error, Debug)]
pub enum Error {
    /// A provider-originated failure with a classifiable kind.
    #[error("[{kind}] {provider}: {message}")]
    Provider {
        kind: ErrorKind,
        provider: String,
        message: String,
        /// Server-provided cooldown reset, when the back-end sent one.
        retry_after: Option<DateTime<Utc>>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("No {category} providers available")]
    NoProviders { category: ProviderCategory },

    #[error("cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a provider failure with an explicit kind
    pub fn provider<P: Into<String>, M: Into<String>>(
        kind: ErrorKind,
        provider: P,
        message: M,
    ) -> Self {
        Self::Provider {
            kind,
            provider: provider.into(),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a rate-limit failure carrying the server-provided reset time
    pub fn rate_limited<P: Into<String>, M: Into<String>>(
        provider: P,
        message: M,
        retry_after: Option<DateTime<Utc>>,
    ) -> Self {
        Self::Provider {
            kind: ErrorKind::RateLimit,
            provider: provider.into(),
            message: message.into(),
            retry_after,
        }
    }

    /// Create a per-attempt timeout failure
    pub fn timeout<P: Into<String>>(provider: P, timeout_ms: u64) -> Self {
        Self::Provider {
            kind: ErrorKind::Timeout,
            provider: provider.into(),
            message: format!("attempt exceeded {} ms deadline", timeout_ms),
            retry_after: None,
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The provider-failure kind, if this error carries one.
    ///
    /// Non-provider variants map onto the taxonomy where the orchestrator
    /// needs them to: invalid arguments are `INVALID_INPUT`, everything else
    /// is unclassified.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Provider { kind, .. } => Some(*kind),
            Error::InvalidArgument { .. } => Some(ErrorKind::InvalidInput),
            _ => None,
        }
    }

    /// The server-provided cooldown reset, if any.
    pub fn retry_after(&self) -> Option<DateTime<Utc>> {
        match self {
            Error::Provider { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
