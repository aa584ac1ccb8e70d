//! Persistence Adapter (§4.11, §6): a `Storage` trait and a JSON-file-backed
//! implementation, grounded on the snapshot manager's `tokio::fs`-based
//! save/restore pattern.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::time::{sleep, Duration};
use tracing::{error, warn};
use uuid::Uuid;

use crate::behavior_store::EndpointBehavior;
use crate::chaos::ChaosProfile;
use crate::drift::DriftAlert;
use crate::error::Result;

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Everything the proxy persists across restarts: per-endpoint behavior,
/// the drift alert table (keyed by UUID per §6), and chaos profiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    pub endpoints: HashMap<String, EndpointBehavior>,
    pub drift_alerts: HashMap<Uuid, DriftAlert>,
    pub global_chaos: ChaosProfile,
}

/// Storage abstraction the Consolidator writes through. Kept as a trait so
/// tests can swap in an in-memory fake without touching the filesystem.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn load(&self) -> Result<PersistedState>;
    async fn save(&self, state: &PersistedState) -> Result<()>;
}

/// Writes the whole state as one JSON document to a fixed path, retrying
/// once with a short backoff on failure before giving up for this cycle
/// (§7 "storage write failure").
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn write_once(&self, state: &PersistedState) -> Result<()> {
        let serialized = serde_json::to_vec_pretty(state)?;
        let tmp_path = tmp_path_for(&self.path);
        fs::write(&tmp_path, &serialized).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[async_trait]
impl Storage for JsonFileStore {
    async fn load(&self) -> Result<PersistedState> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        match self.write_once(state).await {
            Ok(()) => Ok(()),
            Err(first_err) => {
                warn!(error = %first_err, "persistence write failed, retrying once");
                sleep(RETRY_BACKOFF).await;
                match self.write_once(state).await {
                    Ok(()) => Ok(()),
                    Err(second_err) => {
                        error!(
                            error = %second_err,
                            "persistence write failed twice, continuing with in-memory state only"
                        );
                        Ok(())
                    }
                }
            }
        }
    }
}

/// In-memory stand-in for [`Storage`], used in tests that exercise the
/// Consolidator without touching a filesystem.
#[derive(Default)]
pub struct InMemoryStore {
    state: parking_lot::Mutex<PersistedState>,
}

#[async_trait]
impl Storage for InMemoryStore {
    async fn load(&self) -> Result<PersistedState> {
        Ok(self.state.lock().clone())
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        *self.state.lock() = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_a_real_file() {
        let dir = std::env::temp_dir().join(format!("learnproxy-test-{}", Uuid::new_v4()));
        let store = JsonFileStore::new(dir.join("state.json"));

        let mut state = PersistedState::default();
        state.endpoints.insert(
            "/users/{id}".to_string(),
            EndpointBehavior {
                endpoint_key: "/users/{id}".to_string(),
                first_seen_ms: 1_000,
                last_seen_ms: 1_010,
                sample_count: 2,
                latency_mean_ms: 42.0,
                latency_m2: 0.0,
                status_histogram: Default::default(),
                request_schema: None,
                response_schema: None,
                last_request_example: None,
                last_response_example: None,
            },
        );

        store.save(&state).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.endpoints["/users/{id}"].sample_count, 2);

        let _ = fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn loading_a_missing_file_returns_default_state() {
        let missing = std::env::temp_dir().join(format!("learnproxy-missing-{}.json", Uuid::new_v4()));
        let store = JsonFileStore::new(missing);
        let loaded = store.load().await.unwrap();
        assert!(loaded.endpoints.is_empty());
    }

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryStore::default();
        let state = PersistedState::default();
        store.save(&state).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert!(loaded.endpoints.is_empty());
    }
}
