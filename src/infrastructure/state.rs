//! Persistent state: one JSON snapshot of health, history, and
//! configuration overrides.
//!
//! The document is read once at startup and rewritten in full on mutation.
//! Writes are coalesced by time: a save scheduled inside the throttle
//! window replaces any pending deferred write. Save failures are logged
//! and ignored; orchestration continues on in-memory state.

use crate::domain::error::Result;
use crate::infrastructure::config::ConfigOverrides;
use crate::routing::health::ProviderHealthRecord;
use crate::routing::tracker::QueryPerformanceRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Snapshot document format version.
pub const STATE_FORMAT_VERSION: &str = "1.0";

const STATE_FILE_NAME: &str = "omnisearch-state.json";

/// Persistence tuning.
#[derive(Debug, Clone)]
pub struct StateConfig {
    pub dir: PathBuf,
    pub max_history: usize,
    pub save_throttle: Duration,
}

impl StateConfig {
    /// Long-running server defaults.
    pub fn standard() -> Self {
        Self {
            dir: default_state_dir(),
            max_history: 1000,
            save_throttle: Duration::from_millis(5000),
        }
    }

    /// Short-lived (on-demand) process defaults: smaller history, faster
    /// flushes.
    pub fn on_demand() -> Self {
        Self {
            max_history: 100,
            save_throttle: Duration::from_millis(1000),
            ..Self::standard()
        }
    }

    pub fn with_dir(mut self, dir: PathBuf) -> Self {
        self.dir = dir;
        self
    }

    /// Apply `OMNISEARCH_STATE_DIR` / `OMNISEARCH_MAX_HISTORY` /
    /// `OMNISEARCH_SAVE_THROTTLE_MS` from the process environment.
    pub fn from_env(self) -> Self {
        let pairs: Vec<(String, String)> = std::env::vars().collect();
        self.from_env_pairs(&pairs)
    }

    /// Env application over an explicit variable list, for tests.
    pub fn from_env_pairs(mut self, pairs: &[(String, String)]) -> Self {
        for (key, value) in pairs {
            match key.as_str() {
                "OMNISEARCH_STATE_DIR" => {
                    if value.trim().is_empty() {
                        warn!(%key, "ignoring empty state dir");
                    } else {
                        self.dir = PathBuf::from(value);
                    }
                }
                "OMNISEARCH_MAX_HISTORY" => match value.trim().parse::<usize>() {
                    Ok(n) if n > 0 => self.max_history = n,
                    _ => warn!(%key, %value, "ignoring invalid history cap"),
                },
                "OMNISEARCH_SAVE_THROTTLE_MS" => match value.trim().parse::<u64>() {
                    Ok(ms) => self.save_throttle = Duration::from_millis(ms),
                    Err(e) => warn!(%key, %value, error = %e, "ignoring invalid throttle"),
                },
                _ => {}
            }
        }
        self
    }
}

fn default_state_dir() -> PathBuf {
    std::env::temp_dir().join("mcp-omnisearch")
}

/// The persisted snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub provider_health: HashMap<String, ProviderHealthRecord>,
    pub performance_records: Vec<QueryPerformanceRecord>,
    pub configuration_overrides: ConfigOverrides,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_FORMAT_VERSION.to_string(),
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            provider_health: HashMap::new(),
            performance_records: Vec::new(),
            configuration_overrides: ConfigOverrides::default(),
        }
    }
}

/// Assembles the current snapshot document on demand. Implemented by the
/// orchestrator context once all subsystems exist; attached after
/// construction.
#[async_trait]
pub trait StateSource: Send + Sync {
    async fn snapshot(&self) -> PersistedState;
}

struct SaveState {
    last_write: Option<Instant>,
    pending: Option<JoinHandle<()>>,
}

/// Single-writer snapshot manager.
pub struct StateManager {
    config: StateConfig,
    source: RwLock<Option<Arc<dyn StateSource>>>,
    save: Mutex<SaveState>,
}

impl StateManager {
    pub fn new(config: StateConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            source: RwLock::new(None),
            save: Mutex::new(SaveState {
                last_write: None,
                pending: None,
            }),
        })
    }

    pub fn max_history(&self) -> usize {
        self.config.max_history
    }

    /// Wire in the snapshot assembler. Saves scheduled before this are
    /// silently dropped (there is nothing to persist yet).
    pub fn attach_source(&self, source: Arc<dyn StateSource>) {
        *self.source.write().expect("state lock poisoned") = Some(source);
    }

    fn state_path(&self) -> PathBuf {
        self.config.dir.join(STATE_FILE_NAME)
    }

    /// Read the snapshot from disk. Missing, corrupt, or version-mismatched
    /// documents all degrade to empty state; history is capped to the most
    /// recent `max_history` records.
    pub async fn load(&self) -> PersistedState {
        let path = self.state_path();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no persisted state, starting empty");
                return PersistedState::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read state, starting empty");
                return PersistedState::default();
            }
        };

        let mut state: PersistedState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt state document, starting empty");
                return PersistedState::default();
            }
        };

        if state.version != STATE_FORMAT_VERSION {
            warn!(
                found = %state.version,
                expected = STATE_FORMAT_VERSION,
                "state version mismatch, starting empty"
            );
            return PersistedState::default();
        }

        let cap = self.config.max_history;
        if state.performance_records.len() > cap {
            let excess = state.performance_records.len() - cap;
            state.performance_records.drain(..excess);
        }
        state
    }

    /// Request a snapshot write. Writes inside the throttle window are
    /// deferred; a newer request replaces any pending deferred write.
    pub fn schedule_save(self: &Arc<Self>) {
        let mut save = self.save.lock().expect("state lock poisoned");
        if let Some(pending) = save.pending.take() {
            pending.abort();
        }

        let elapsed = save.last_write.map(|t| t.elapsed());
        let due_now = elapsed.is_none_or(|e| e >= self.config.save_throttle);
        if due_now {
            save.last_write = Some(Instant::now());
            drop(save);
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = manager.write_snapshot().await {
                    warn!(error = %e, "snapshot save failed, continuing on in-memory state");
                }
            });
        } else {
            let remaining = self
                .config
                .save_throttle
                .checked_sub(elapsed.unwrap_or_default())
                .unwrap_or_default();
            let manager = Arc::clone(self);
            save.pending = Some(tokio::spawn(async move {
                tokio::time::sleep(remaining).await;
                {
                    let mut save = manager.save.lock().expect("state lock poisoned");
                    save.last_write = Some(Instant::now());
                    save.pending = None;
                }
                if let Err(e) = manager.write_snapshot().await {
                    warn!(error = %e, "snapshot save failed, continuing on in-memory state");
                }
            }));
        }
    }

    /// Cancel any pending deferred write and write immediately.
    pub async fn flush(self: &Arc<Self>) -> Result<()> {
        {
            let mut save = self.save.lock().expect("state lock poisoned");
            if let Some(pending) = save.pending.take() {
                pending.abort();
            }
            save.last_write = Some(Instant::now());
        }
        self.write_snapshot().await
    }

    /// Serialize the full document and atomically replace the file.
    async fn write_snapshot(&self) -> Result<()> {
        let source = self
            .source
            .read()
            .expect("state lock poisoned")
            .as_ref()
            .map(Arc::clone);
        let Some(source) = source else {
            return Ok(());
        };

        let snapshot = source.snapshot().await;
        let json = serde_json::to_string_pretty(&snapshot)?;

        tokio::fs::create_dir_all(&self.config.dir).await?;
        let path = self.state_path();
        let tmp = self.config.dir.join(format!("{}.tmp", STATE_FILE_NAME));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "snapshot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(PersistedState);

    #[async_trait]
    impl StateSource for FixedSource {
        async fn snapshot(&self) -> PersistedState {
            self.0.clone()
        }
    }

    fn temp_config() -> StateConfig {
        let dir = tempfile::tempdir().expect("tempdir").keep();
        StateConfig::standard().with_dir(dir)
    }

    #[tokio::test]
    async fn missing_file_loads_empty_state() {
        let manager = StateManager::new(temp_config());
        let state = manager.load().await;
        assert!(state.provider_health.is_empty());
        assert!(state.performance_records.is_empty());
    }

    #[tokio::test]
    async fn version_mismatch_loads_empty_state() {
        let config = temp_config();
        std::fs::create_dir_all(&config.dir).unwrap();
        std::fs::write(
            config.dir.join(STATE_FILE_NAME),
            r#"{"version":"0.9","last_updated":"2024-01-01T00:00:00Z","provider_health":{},"performance_records":[],"configuration_overrides":{}}"#,
        )
        .unwrap();

        let manager = StateManager::new(config);
        let state = manager.load().await;
        assert_eq!(state.version, STATE_FORMAT_VERSION);
        assert!(state.provider_health.is_empty());
    }

    #[tokio::test]
    async fn corrupt_document_loads_empty_state() {
        let config = temp_config();
        std::fs::create_dir_all(&config.dir).unwrap();
        std::fs::write(config.dir.join(STATE_FILE_NAME), "{not json").unwrap();

        let manager = StateManager::new(config);
        let state = manager.load().await;
        assert!(state.performance_records.is_empty());
    }

    #[tokio::test]
    async fn flush_writes_the_attached_source_document() {
        let config = temp_config();
        let manager = StateManager::new(config.clone());

        let mut doc = PersistedState::default();
        doc.configuration_overrides.fallback_enabled = Some(false);
        manager.attach_source(Arc::new(FixedSource(doc)));

        manager.flush().await.unwrap();

        let reloaded = manager.load().await;
        assert_eq!(reloaded.configuration_overrides.fallback_enabled, Some(false));
        assert!(!config.dir.join(format!("{}.tmp", STATE_FILE_NAME)).exists());
    }

    #[tokio::test]
    async fn save_without_source_is_a_no_op() {
        let config = temp_config();
        let manager = StateManager::new(config.clone());
        manager.flush().await.unwrap();
        assert!(!config.dir.join(STATE_FILE_NAME).exists());
    }

    #[tokio::test(start_paused = true)]
    async fn saves_inside_the_throttle_window_coalesce() {
        let mut config = temp_config();
        config.save_throttle = Duration::from_millis(5000);
        let manager = StateManager::new(config.clone());
        manager.attach_source(Arc::new(FixedSource(PersistedState::default())));

        manager.schedule_save();
        tokio::task::yield_now().await;

        // Two more saves inside the window: both defer, only one pending task.
        manager.schedule_save();
        manager.schedule_save();
        {
            let save = manager.save.lock().unwrap();
            assert!(save.pending.is_some());
        }

        // After the window lapses the deferred write runs and clears itself.
        tokio::time::sleep(Duration::from_millis(5100)).await;
        tokio::task::yield_now().await;
        {
            let save = manager.save.lock().unwrap();
            assert!(save.pending.is_none());
        }
        manager.flush().await.unwrap();
        assert!(config.dir.join(STATE_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn env_pairs_tune_the_config() {
        let pairs = vec![
            ("OMNISEARCH_MAX_HISTORY".to_string(), "100".to_string()),
            ("OMNISEARCH_SAVE_THROTTLE_MS".to_string(), "1000".to_string()),
            ("OMNISEARCH_MAX_HISTORY".to_string(), "zero".to_string()),
        ];
        let config = StateConfig::standard().from_env_pairs(&pairs);
        // the later invalid value is ignored, the earlier valid one sticks
        assert_eq!(config.max_history, 100);
        assert_eq!(config.save_throttle, Duration::from_millis(1000));
    }
}
