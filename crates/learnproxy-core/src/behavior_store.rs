//! Behavior Store (§4.4): per-endpoint aggregate statistics, status
//! histograms, merged schemas, and a bounded last-example payload.
//!
//! Partitioned by endpoint key, mirroring the concurrency model in §5 — each
//! partition owns its own lock so that busy endpoints never contend with
//! quiet ones.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{learn, Descriptor};

/// Payloads larger than this are stored truncated with a marker rather than
/// in full.
pub const MAX_EXAMPLE_PAYLOAD_BYTES: usize = 64 * 1024;
const ALPHA: f64 = 0.1;

/// A bucketed view of observed status codes: `class` is `status / 100`
/// (e.g. `2` for 2xx), `exact` is the full status code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusHistogram {
    pub by_class: HashMap<u16, u64>,
    pub by_code: HashMap<u16, u64>,
}

impl StatusHistogram {
    fn record(&mut self, status: u16) {
        *self.by_class.entry(status / 100).or_insert(0) += 1;
        *self.by_code.entry(status).or_insert(0) += 1;
    }
}

/// A request/response payload kept as the endpoint's last example,
/// truncated if it would otherwise exceed [`MAX_EXAMPLE_PAYLOAD_BYTES`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExamplePayload {
    Full(Value),
    Truncated { preview: String, original_bytes: usize },
}

impl ExamplePayload {
    fn from_value(value: &Value) -> Self {
        let rendered = value.to_string();
        if rendered.len() <= MAX_EXAMPLE_PAYLOAD_BYTES {
            Self::Full(value.clone())
        } else {
            let preview: String = rendered.chars().take(MAX_EXAMPLE_PAYLOAD_BYTES).collect();
            Self::Truncated { preview, original_bytes: rendered.len() }
        }
    }
}

/// Aggregate behavior recorded for a single normalized endpoint pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointBehavior {
    pub endpoint_key: String,
    pub first_seen_ms: i64,
    pub last_seen_ms: i64,
    pub sample_count: u64,
    pub latency_mean_ms: f64,
    pub latency_m2: f64,
    pub status_histogram: StatusHistogram,
    pub request_schema: Option<Descriptor>,
    pub response_schema: Option<Descriptor>,
    pub last_request_example: Option<ExamplePayload>,
    pub last_response_example: Option<ExamplePayload>,
}

impl EndpointBehavior {
    fn new(endpoint_key: String, timestamp_ms: i64) -> Self {
        Self {
            endpoint_key,
            first_seen_ms: timestamp_ms,
            last_seen_ms: timestamp_ms,
            sample_count: 0,
            latency_mean_ms: 0.0,
            latency_m2: 0.0,
            status_histogram: StatusHistogram::default(),
            request_schema: None,
            response_schema: None,
            last_request_example: None,
            last_response_example: None,
        }
    }

    /// Reported standard deviation: `σ = √max(0, m2 − μ²)`.
    pub fn latency_stddev_ms(&self) -> f64 {
        (self.latency_m2 - self.latency_mean_ms * self.latency_mean_ms).max(0.0).sqrt()
    }

    fn record(
        &mut self,
        timestamp_ms: i64,
        latency_ms: u64,
        status: u16,
        req_payload: Option<&Value>,
        resp_payload: Option<&Value>,
    ) {
        let x = latency_ms as f64;
        self.latency_mean_ms = (1.0 - ALPHA) * self.latency_mean_ms + ALPHA * x;
        self.latency_m2 = (1.0 - ALPHA) * self.latency_m2 + ALPHA * x * x;
        self.status_histogram.record(status);
        self.last_seen_ms = timestamp_ms;

        if let Some(body) = req_payload {
            self.request_schema = Some(learn(self.request_schema.take(), body));
            self.last_request_example = Some(ExamplePayload::from_value(body));
        }
        if let Some(body) = resp_payload {
            self.response_schema = Some(learn(self.response_schema.take(), body));
            self.last_response_example = Some(ExamplePayload::from_value(body));
        }
        self.sample_count += 1;
    }
}

/// Partitioned store of per-endpoint behavior, one mutex per endpoint key.
#[derive(Debug, Default)]
pub struct BehaviorStore {
    partitions: Mutex<HashMap<String, Arc<Mutex<EndpointBehavior>>>>,
}

impl BehaviorStore {
    pub fn new() -> Self {
        Self { partitions: Mutex::new(HashMap::new()) }
    }

    fn partition(&self, endpoint_key: &str, timestamp_ms: i64) -> Arc<Mutex<EndpointBehavior>> {
        let mut partitions = self.partitions.lock();
        partitions
            .entry(endpoint_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(EndpointBehavior::new(endpoint_key.to_string(), timestamp_ms))))
            .clone()
    }

    /// Record one observed transaction for `endpoint_key` under its own lock.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        endpoint_key: &str,
        timestamp_ms: i64,
        latency_ms: u64,
        status: u16,
        req_payload: Option<&Value>,
        resp_payload: Option<&Value>,
    ) {
        let partition = self.partition(endpoint_key, timestamp_ms);
        let mut behavior = partition.lock();
        behavior.record(timestamp_ms, latency_ms, status, req_payload, resp_payload);
    }

    /// Snapshot the current behavior recorded for an endpoint, if any.
    pub fn get(&self, endpoint_key: &str) -> Option<EndpointBehavior> {
        let partitions = self.partitions.lock();
        partitions.get(endpoint_key).map(|p| p.lock().clone())
    }

    /// All endpoint keys currently tracked, for admin listing.
    pub fn endpoint_keys(&self) -> Vec<String> {
        self.partitions.lock().keys().cloned().collect()
    }

    /// Install a behavior snapshot loaded from storage, replacing whatever
    /// partition (if any) already exists under its key.
    pub fn restore(&self, behavior: EndpointBehavior) {
        let mut partitions = self.partitions.lock();
        partitions.insert(behavior.endpoint_key.clone(), Arc::new(Mutex::new(behavior)));
    }

    /// Give callers (the Consolidator, Health Monitor) access to the same
    /// per-endpoint lock the store itself uses, so a single request's
    /// behavior update and health sample land under one critical section.
    pub fn partition_handle(&self, endpoint_key: &str, timestamp_ms: i64) -> Arc<Mutex<EndpointBehavior>> {
        self.partition(endpoint_key, timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_two_requests_on_same_endpoint() {
        let store = BehaviorStore::new();
        store.record("/users/{id}", 1_000, 50, 200, None, Some(&json!({"id": 1})));
        store.record("/users/{id}", 1_010, 60, 200, None, Some(&json!({"id": 2})));
        let behavior = store.get("/users/{id}").unwrap();
        assert_eq!(behavior.sample_count, 2);
        assert_eq!(behavior.status_histogram.by_code.get(&200), Some(&2));
    }

    #[test]
    fn large_payload_is_truncated_with_marker() {
        let huge = json!({"blob": "x".repeat(MAX_EXAMPLE_PAYLOAD_BYTES + 10)});
        let store = BehaviorStore::new();
        store.record("/blobs", 1_000, 10, 200, None, Some(&huge));
        let behavior = store.get("/blobs").unwrap();
        match behavior.last_response_example {
            Some(ExamplePayload::Truncated { original_bytes, .. }) => {
                assert!(original_bytes > MAX_EXAMPLE_PAYLOAD_BYTES);
            }
            other => panic!("expected truncated payload, got {other:?}"),
        }
    }

    #[test]
    fn distinct_endpoints_do_not_share_state() {
        let store = BehaviorStore::new();
        store.record("/a", 1_000, 10, 200, None, None);
        store.record("/b", 1_000, 20, 404, None, None);
        assert_eq!(store.get("/a").unwrap().sample_count, 1);
        assert_eq!(store.get("/b").unwrap().status_histogram.by_class.get(&4), Some(&1));
    }

    #[test]
    fn ema_latency_moves_toward_new_samples() {
        let store = BehaviorStore::new();
        for i in 0..50 {
            store.record("/slow", 1_000 + i, 100, 200, None, None);
        }
        let before = store.get("/slow").unwrap().latency_mean_ms;
        store.record("/slow", 1_050, 1000, 200, None, None);
        let after = store.get("/slow").unwrap().latency_mean_ms;
        assert!(after > before);
    }
}
