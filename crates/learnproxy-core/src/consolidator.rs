//! Consolidator: the single background worker that drains the Learning
//! Buffer, in FIFO order, into the Behavior Store, Drift Detector, and
//! Health Monitor, broadcasting an event once each transaction's store
//! update has committed.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::buffer::Shutdown;
use crate::dispatch::Engine;
use crate::persistence::{PersistedState, Storage};

/// Default grace period for draining the Learning Buffer on shutdown (§5).
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Drives the Consolidator loop until `shutdown` is signaled and the buffer
/// has been drained. The caller is responsible for enforcing
/// [`SHUTDOWN_GRACE_PERIOD`] by racing this future against a timeout once it
/// triggers `shutdown` — draining forever here would let a wedged buffer
/// hang the process.
pub async fn run(engine: Arc<Engine>, shutdown: Arc<Shutdown>) {
    loop {
        let batch = engine.buffer.dequeue_batch(&shutdown).await;
        if batch.is_empty() {
            break;
        }
        for txn in batch {
            let event = engine.consolidate_one(txn);
            engine.broadcaster.publish(event);
        }
    }
    debug!("consolidator loop exited");
}

/// Periodically flushes the Engine's accumulated state to `storage`. Runs
/// independently of the Consolidator loop so a slow disk never blocks
/// consolidation.
pub async fn run_persistence_flusher(engine: Arc<Engine>, storage: Arc<dyn Storage>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(e) = flush_once(&engine, storage.as_ref()).await {
            warn!(error = %e, "persistence flush failed");
        }
    }
}

/// Snapshot the Engine's current behavior, drift, and chaos state and
/// persist it. Exposed publicly so callers can force a final flush (e.g.
/// at shutdown) outside the periodic flusher loop.
pub async fn flush_once(engine: &Engine, storage: &dyn Storage) -> crate::error::Result<()> {
    let mut state = PersistedState::default();
    for endpoint_key in engine.behavior.endpoint_keys() {
        if let Some(behavior) = engine.behavior.get(&endpoint_key) {
            state.endpoints.insert(endpoint_key, behavior);
        }
    }
    state.drift_alerts = engine.drift.read().snapshot();
    state.global_chaos = engine.chaos.global();
    storage.save(&state).await?;
    info!(endpoints = state.endpoints.len(), "persisted state flushed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{LearningBuffer, Transaction};
    use crate::chaos::ChaosRegistry;
    use crate::config::{Failover, RunMode};
    use async_trait::async_trait;

    struct NeverForward;

    #[async_trait]
    impl crate::dispatch::Forwarder for NeverForward {
        async fn forward(
            &self,
            _target_base: &str,
            _request: &crate::dispatch::InboundRequest,
        ) -> Result<crate::dispatch::OutboundResponse, crate::dispatch::ForwardError> {
            unreachable!("test does not forward")
        }
    }

    fn txn(path: &str) -> Transaction {
        Transaction {
            method: "GET".to_string(),
            path: path.to_string(),
            status: 200,
            latency_ms: 5,
            req_headers: Vec::new(),
            req_body: None,
            resp_headers: Vec::new(),
            resp_body: Some(serde_json::json!({"id": 1})),
            timestamp_ms: 0,
            mocked: false,
            chaos: false,
        }
    }

    #[tokio::test]
    async fn consolidating_a_transaction_updates_behavior_store() {
        let buffer = Arc::new(LearningBuffer::new(16));
        let engine = Arc::new(Engine::new(
            RunMode::Proxy,
            Failover::On,
            None,
            Arc::new(NeverForward),
            buffer.clone(),
        ));
        let _ = engine.chaos.effective("/x"); // touch to ensure ChaosRegistry wired
        buffer.enqueue(txn("/users/{id}"));

        let shutdown = Arc::new(Shutdown::new());
        shutdown.trigger();
        run(engine.clone(), shutdown).await;

        let behavior = engine.behavior.get("/users/{id}").unwrap();
        assert_eq!(behavior.sample_count, 1);
    }

    #[tokio::test]
    async fn flush_once_writes_every_tracked_endpoint() {
        let buffer = Arc::new(LearningBuffer::new(16));
        let engine = Arc::new(Engine::new(
            RunMode::Proxy,
            Failover::On,
            None,
            Arc::new(NeverForward),
            buffer,
        ));
        let _ = ChaosRegistry::new();
        engine.behavior.record("/a", 1_000, 10, 200, None, None);
        let storage = Arc::new(crate::persistence::InMemoryStore::default());
        flush_once(&engine, storage.as_ref()).await.unwrap();
        let loaded = storage.load().await.unwrap();
        assert!(loaded.endpoints.contains_key("/a"));
    }
}
