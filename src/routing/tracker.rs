//! Rolling per-provider performance statistics and adaptive ranking.
//!
//! Aggregates are maintained incrementally on every record (running means,
//! no history scans); the recent-window success rates are the only O(n)
//! computation in the hot path and are recomputed from the capped history.

use crate::analyzer::{QueryCharacteristics, QueryType};
use crate::domain::error::ErrorKind;
use crate::domain::ports::Clock;
use crate::infrastructure::state::StateManager;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Adaptive ranking weights; they sum to 1.0.
const WEIGHT_SUCCESS_RATE: f64 = 0.2;
const WEIGHT_RECENT_HOUR: f64 = 0.3;
const WEIGHT_QUERY_TYPE: f64 = 0.4;
const WEIGHT_SPEED: f64 = 0.1;

/// Providers with no recorded history rank at this neutral score.
const UNKNOWN_PROVIDER_SCORE: f64 = 0.5;

/// A per-type block needs this many samples before it outranks the overall
/// success rate.
const QUERY_TYPE_MIN_SAMPLES: u64 = 3;

/// Caller judgement attached to a past outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserFeedback {
    Positive,
    Negative,
}

/// One dispatched outcome, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPerformanceRecord {
    pub query: String,
    pub characteristics: QueryCharacteristics,
    pub provider_used: String,
    pub success: bool,
    pub response_time_ms: u64,
    pub result_count: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<UserFeedback>,
}

/// Incremental statistics for one (provider, query type) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryTypeStats {
    pub count: u64,
    pub success_rate: f64,
    pub avg_response_time: f64,
}

/// Sliding success rates over recent windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentPerformance {
    pub last_hour: f64,
    pub last_day: f64,
    pub last_week: f64,
}

/// Rolling aggregate for one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub average_response_time: f64,
    pub query_type_performance: HashMap<QueryType, QueryTypeStats>,
    pub recent_performance: RecentPerformance,
}

/// Derived cross-provider insights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInsights {
    pub best_overall: Option<String>,
    pub best_for_speed: Option<String>,
    pub most_reliable: Option<String>,
    pub trending_up: Vec<String>,
    pub trending_down: Vec<String>,
}

struct TrackerInner {
    history: VecDeque<QueryPerformanceRecord>,
    stats: HashMap<String, ProviderStats>,
}

/// Shared performance tracker; one coarse lock over history and aggregates.
pub struct PerformanceTracker {
    inner: RwLock<TrackerInner>,
    max_history: usize,
    clock: Arc<dyn Clock>,
    state: Arc<StateManager>,
}

impl PerformanceTracker {
    pub fn new(max_history: usize, clock: Arc<dyn Clock>, state: Arc<StateManager>) -> Self {
        Self {
            inner: RwLock::new(TrackerInner {
                history: VecDeque::new(),
                stats: HashMap::new(),
            }),
            max_history,
            clock,
            state,
        }
    }

    /// Rebuild from persisted records, replaying aggregates and recomputing
    /// the recent windows once per provider.
    pub fn from_records(
        records: Vec<QueryPerformanceRecord>,
        max_history: usize,
        clock: Arc<dyn Clock>,
        state: Arc<StateManager>,
    ) -> Self {
        let mut inner = TrackerInner {
            history: VecDeque::new(),
            stats: HashMap::new(),
        };
        for record in records {
            apply_record(&mut inner, record, max_history);
        }
        let now = clock.now();
        let providers: Vec<String> = inner.stats.keys().cloned().collect();
        for provider in providers {
            recompute_windows(&mut inner, &provider, now);
        }
        Self {
            inner: RwLock::new(inner),
            max_history,
            clock,
            state,
        }
    }

    /// Append one outcome and update the matching aggregate in place.
    pub async fn record_query_result(&self, record: QueryPerformanceRecord) {
        let provider = record.provider_used.clone();
        let now = self.clock.now();
        {
            let mut inner = self.inner.write().await;
            apply_record(&mut inner, record, self.max_history);
            recompute_windows(&mut inner, &provider, now);
        }
        self.state.schedule_save();
    }

    /// Attach user feedback to the most recent record for a query.
    pub async fn record_feedback(&self, query: &str, feedback: UserFeedback) -> bool {
        let updated = {
            let mut inner = self.inner.write().await;
            match inner.history.iter_mut().rev().find(|r| r.query == query) {
                Some(record) => {
                    record.user_feedback = Some(feedback);
                    true
                }
                None => false,
            }
        };
        if updated {
            self.state.schedule_save();
        }
        updated
    }

    /// Rank candidates by weighted historical performance, best first.
    /// Ties keep the candidate input order; unknown providers rank neutral.
    pub async fn adaptive_ranking(
        &self,
        characteristics: Option<&QueryCharacteristics>,
        candidates: &[String],
    ) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|name| {
                let score = match inner.stats.get(name) {
                    Some(stats) => adaptive_score(stats, characteristics),
                    None => UNKNOWN_PROVIDER_SCORE,
                };
                (name.clone(), score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        debug!(?scored, "adaptive ranking computed");
        scored.into_iter().map(|(name, _)| name).collect()
    }

    /// Cross-provider insights for reporting.
    pub async fn insights(&self) -> PerformanceInsights {
        let inner = self.inner.read().await;
        let mut names: Vec<&String> = inner.stats.keys().collect();
        names.sort();

        let mut insights = PerformanceInsights::default();
        let mut best_overall = f64::NEG_INFINITY;
        let mut best_speed = f64::INFINITY;
        let mut most_reliable = f64::NEG_INFINITY;

        for name in names {
            let stats = &inner.stats[name];
            if stats.total_requests == 0 {
                continue;
            }
            let overall = stats.success_rate * (1.0 - stats.average_response_time / 10_000.0);
            if overall > best_overall {
                best_overall = overall;
                insights.best_overall = Some(name.clone());
            }
            if stats.average_response_time < best_speed {
                best_speed = stats.average_response_time;
                insights.best_for_speed = Some(name.clone());
            }
            if stats.success_rate > most_reliable {
                most_reliable = stats.success_rate;
                insights.most_reliable = Some(name.clone());
            }
            let drift = stats.recent_performance.last_hour - stats.recent_performance.last_week;
            if drift > 0.1 {
                insights.trending_up.push(name.clone());
            } else if drift < -0.1 {
                insights.trending_down.push(name.clone());
            }
        }
        insights
    }

    /// Aggregate snapshot per provider.
    pub async fn stats(&self) -> HashMap<String, ProviderStats> {
        self.inner.read().await.stats.clone()
    }

    /// Full history snapshot, oldest first.
    pub async fn records(&self) -> Vec<QueryPerformanceRecord> {
        self.inner.read().await.history.iter().cloned().collect()
    }

    pub async fn history_len(&self) -> usize {
        self.inner.read().await.history.len()
    }

    /// Detailed JSON export for diagnostics.
    pub async fn export(&self) -> serde_json::Value {
        let inner = self.inner.read().await;
        json!({
            "generated_at": self.clock.now(),
            "record_count": inner.history.len(),
            "providers": inner.stats,
        })
    }
}

fn apply_record(inner: &mut TrackerInner, record: QueryPerformanceRecord, max_history: usize) {
    let stats = inner
        .stats
        .entry(record.provider_used.clone())
        .or_default();

    stats.total_requests += 1;
    if record.success {
        stats.successful_requests += 1;
    } else {
        stats.failed_requests += 1;
    }
    stats.success_rate = stats.successful_requests as f64 / stats.total_requests as f64;
    let rt = record.response_time_ms as f64;
    stats.average_response_time += (rt - stats.average_response_time) / stats.total_requests as f64;

    let type_stats = stats
        .query_type_performance
        .entry(record.characteristics.query_type)
        .or_default();
    type_stats.count += 1;
    type_stats.avg_response_time += (rt - type_stats.avg_response_time) / type_stats.count as f64;
    let outcome = if record.success { 1.0 } else { 0.0 };
    type_stats.success_rate =
        (type_stats.success_rate * (type_stats.count - 1) as f64 + outcome) / type_stats.count as f64;

    inner.history.push_back(record);
    while inner.history.len() > max_history {
        inner.history.pop_front();
    }
}

fn recompute_windows(inner: &mut TrackerInner, provider: &str, now: DateTime<Utc>) {
    let hour_cutoff = now - Duration::hours(1);
    let day_cutoff = now - Duration::days(1);
    let week_cutoff = now - Duration::days(7);

    let mut counts = [(0u64, 0u64); 3];
    for record in inner.history.iter().filter(|r| r.provider_used == provider) {
        for (i, cutoff) in [hour_cutoff, day_cutoff, week_cutoff].iter().enumerate() {
            if record.timestamp >= *cutoff {
                counts[i].0 += 1;
                if record.success {
                    counts[i].1 += 1;
                }
            }
        }
    }

    let rate = |(total, ok): (u64, u64)| {
        if total == 0 { 0.0 } else { ok as f64 / total as f64 }
    };
    if let Some(stats) = inner.stats.get_mut(provider) {
        stats.recent_performance = RecentPerformance {
            last_hour: rate(counts[0]),
            last_day: rate(counts[1]),
            last_week: rate(counts[2]),
        };
    }
}

fn adaptive_score(stats: &ProviderStats, characteristics: Option<&QueryCharacteristics>) -> f64 {
    let type_rate = characteristics
        .and_then(|c| stats.query_type_performance.get(&c.query_type))
        .filter(|t| t.count >= QUERY_TYPE_MIN_SAMPLES)
        .map(|t| t.success_rate)
        .unwrap_or(stats.success_rate);
    let speed = (1.0 - stats.average_response_time / 30_000.0).max(0.0);

    WEIGHT_SUCCESS_RATE * stats.success_rate
        + WEIGHT_RECENT_HOUR * stats.recent_performance.last_hour
        + WEIGHT_QUERY_TYPE * type_rate
        + WEIGHT_SPEED * speed
}
