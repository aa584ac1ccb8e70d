//! Dispatch Core (§4.8): the per-request state machine tying every other
//! component together — normalize, decide mock vs proxy, forward or
//! synthesize, record, and respond.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use serde_json::Value;
use tracing::{info, warn};

use crate::behavior_store::BehaviorStore;
use crate::broadcaster::{Broadcaster, TransactionEvent};
use crate::buffer::{LearningBuffer, Transaction};
use crate::chaos::{self, ChaosOutcome, ChaosRegistry};
use crate::config::{Failover, RunMode};
use crate::drift::DriftRegistry;
use crate::generator;
use crate::health::{HealthRegistry, HealthSample};
use crate::normalizer::normalize;

/// Forward connect timeout (§4.8).
pub const FORWARD_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Forward total timeout (§4.8).
pub const FORWARD_TOTAL_TIMEOUT: Duration = Duration::from_secs(30);

/// An inbound request as seen by the Dispatch Core, transport-agnostic.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// An outbound response, transport-agnostic.
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub mocked: bool,
    pub chaos: bool,
}

/// Transport-level forward failure: upstream timeout, connection refused, or
/// DNS failure all collapse to one variant because the Dispatch Core treats
/// them identically (§7).
#[derive(Debug, thiserror::Error)]
#[error("upstream forward failed: {0}")]
pub struct ForwardError(pub String);

/// The shared outbound client used for forwarding (§5: "a single HTTP
/// client is shared for outbound forwarding").
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, target_base: &str, request: &InboundRequest) -> Result<OutboundResponse, ForwardError>;
}

/// `reqwest`-backed forwarder with the fixed connect/total timeouts (§4.8).
pub struct ReqwestForwarder {
    client: reqwest::Client,
}

impl ReqwestForwarder {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(FORWARD_CONNECT_TIMEOUT)
            .timeout(FORWARD_TOTAL_TIMEOUT)
            .build()
            .expect("reqwest client configuration is static and always valid");
        Self { client }
    }
}

impl Default for ReqwestForwarder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Forwarder for ReqwestForwarder {
    async fn forward(&self, target_base: &str, request: &InboundRequest) -> Result<OutboundResponse, ForwardError> {
        let url = format!("{}{}", target_base.trim_end_matches('/'), request.path);
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| ForwardError(e.to_string()))?;

        let mut builder = self.client.request(method, url).body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| ForwardError(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response.bytes().await.map_err(|e| ForwardError(e.to_string()))?.to_vec();

        Ok(OutboundResponse { status, headers, body, mocked: false, chaos: false })
    }
}

fn is_json_content_type(headers: &[(String, String)]) -> bool {
    headers.iter().any(|(k, v)| {
        k.eq_ignore_ascii_case("content-type") && v.to_lowercase().starts_with("application/json")
    })
}

fn parse_json_body(headers: &[(String, String)], body: &[u8]) -> Option<Value> {
    if body.is_empty() || !is_json_content_type(headers) {
        return None;
    }
    serde_json::from_slice(body).ok()
}

/// The Endpoint identity (§3): `(method, pattern_key)`, joined as a single
/// string so every lock-partitioned store can keep keying on a plain
/// `&str` without carrying the tuple through every signature.
pub fn endpoint_key(method: &str, pattern_key: &str) -> String {
    format!("{} {pattern_key}", method.to_uppercase())
}

/// The Dispatch Core's shared state: every component a request touches.
pub struct Engine {
    pub behavior: BehaviorStore,
    pub health: HealthRegistry,
    pub drift: RwLock<DriftRegistry>,
    pub chaos: ChaosRegistry,
    pub buffer: Arc<LearningBuffer>,
    pub broadcaster: Broadcaster,
    pub mode: RwLock<RunMode>,
    pub failover: RwLock<Failover>,
    pub forwarder: Arc<dyn Forwarder>,
    pub target_base: RwLock<Option<String>>,
}

impl Engine {
    pub fn new(
        mode: RunMode,
        failover: Failover,
        target_base: Option<String>,
        forwarder: Arc<dyn Forwarder>,
        buffer: Arc<LearningBuffer>,
    ) -> Self {
        Self {
            behavior: BehaviorStore::new(),
            health: HealthRegistry::new(),
            drift: RwLock::new(DriftRegistry::new()),
            chaos: ChaosRegistry::new(),
            buffer,
            broadcaster: Broadcaster::new(),
            mode: RwLock::new(mode),
            failover: RwLock::new(failover),
            forwarder,
            target_base: RwLock::new(target_base),
        }
    }

    pub fn set_mode(&self, mode: RunMode) {
        *self.mode.write() = mode;
    }

    pub fn mode(&self) -> RunMode {
        *self.mode.read()
    }

    /// Load behavior, drift alerts, and the global chaos profile persisted
    /// from a prior run. Called once at boot, before serving any request.
    pub fn hydrate(&self, state: crate::persistence::PersistedState) {
        for (_, behavior) in state.endpoints {
            self.behavior.restore(behavior);
        }
        self.drift.write().restore(state.drift_alerts);
        self.chaos.set_global(state.global_chaos);
    }

    /// Handle one request end to end: RECEIVE → NORMALIZE → LOAD_ENDPOINT →
    /// decide mock/proxy → synthesize or forward → record → respond.
    pub async fn handle_request(&self, request: InboundRequest) -> OutboundResponse {
        let started = std::time::Instant::now();
        let path_without_query = request.path.split('?').next().unwrap_or(&request.path);
        let pattern_key = normalize(path_without_query);
        let endpoint_key = endpoint_key(&request.method, &pattern_key);
        let request_body = parse_json_body(&request.headers, &request.body);

        let mode = self.mode();
        let (response, chaos_applied) = match mode {
            RunMode::Mock => (self.synthesize_response(&endpoint_key, request_body.as_ref()).await, false),
            RunMode::Proxy => self.dispatch_proxy(&endpoint_key, &request, request_body.as_ref()).await,
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        self.record_and_broadcast(&endpoint_key, &request, &response, chaos_applied, latency_ms).await;
        response
    }

    async fn dispatch_proxy(
        &self,
        endpoint_key: &str,
        request: &InboundRequest,
        request_body: Option<&Value>,
    ) -> (OutboundResponse, bool) {
        let profile = self.chaos.effective(endpoint_key);
        let roll = rand::rng().random::<f64>();
        let outcome = chaos::apply(&profile, roll);

        match outcome {
            ChaosOutcome::ForcedResponse { status_code, extra_latency_ms } => {
                tokio::time::sleep(Duration::from_millis(extra_latency_ms)).await;
                (
                    OutboundResponse { status: status_code, headers: Vec::new(), body: Vec::new(), mocked: false, chaos: true },
                    true,
                )
            }
            ChaosOutcome::SimulatedError { extra_latency_ms } => {
                tokio::time::sleep(Duration::from_millis(extra_latency_ms)).await;
                (self.handle_forward_failure(endpoint_key, request_body).await, true)
            }
            ChaosOutcome::DelayedPassthrough { extra_latency_ms } => {
                tokio::time::sleep(Duration::from_millis(extra_latency_ms)).await;
                (self.forward_or_failover(endpoint_key, request, request_body).await, true)
            }
            ChaosOutcome::Passthrough => (self.forward_or_failover(endpoint_key, request, request_body).await, false),
        }
    }

    async fn forward_or_failover(
        &self,
        endpoint_key: &str,
        request: &InboundRequest,
        request_body: Option<&Value>,
    ) -> OutboundResponse {
        let target_base = self.target_base.read().clone();
        let Some(target_base) = target_base else {
            return self.handle_forward_failure(endpoint_key, request_body).await;
        };

        match self.forwarder.forward(&target_base, request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, endpoint = endpoint_key, "forward failed");
                self.handle_forward_failure(endpoint_key, request_body).await
            }
        }
    }

    async fn handle_forward_failure(&self, endpoint_key: &str, request_body: Option<&Value>) -> OutboundResponse {
        if self.failover.read().is_enabled() {
            self.synthesize_response(endpoint_key, request_body).await
        } else {
            OutboundResponse { status: 502, headers: Vec::new(), body: Vec::new(), mocked: false, chaos: false }
        }
    }

    async fn synthesize_response(&self, endpoint_key: &str, request_body: Option<&Value>) -> OutboundResponse {
        let behavior = self.behavior.get(endpoint_key);
        let body = match behavior.as_ref().and_then(|b| b.response_schema.clone()) {
            Some(schema) => {
                if let Some(mean) = behavior.as_ref().map(|b| b.latency_mean_ms) {
                    let delay_ms = mean.min(5000.0) as u64;
                    if delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
                generator::generate(&schema, request_body)
            }
            None => serde_json::json!({}),
        };
        let payload = serde_json::to_vec(&body).unwrap_or_default();
        OutboundResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: payload,
            mocked: true,
            chaos: false,
        }
    }

    async fn record_and_broadcast(
        &self,
        endpoint_key: &str,
        request: &InboundRequest,
        response: &OutboundResponse,
        chaos_applied: bool,
        latency_ms: u64,
    ) {
        let req_body = parse_json_body(&request.headers, &request.body);
        let resp_body = parse_json_body(&response.headers, &response.body);

        let transaction = Transaction {
            method: request.method.clone(),
            path: endpoint_key.to_string(),
            status: response.status,
            latency_ms,
            req_headers: request.headers.clone(),
            req_body,
            resp_headers: response.headers.clone(),
            resp_body,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            mocked: response.mocked,
            chaos: chaos_applied || response.chaos,
        };

        self.buffer.enqueue(transaction);
        info!(endpoint = endpoint_key, status = response.status, mocked = response.mocked, "dispatched");
    }

    /// Build the event the Consolidator publishes once a transaction's
    /// Behavior Store update has committed.
    pub fn transaction_event(&self, endpoint_key: &str, txn: &Transaction) -> TransactionEvent {
        TransactionEvent {
            endpoint_key: endpoint_key.to_string(),
            method: txn.method.clone(),
            status: txn.status,
            latency_ms: txn.latency_ms,
            mocked: txn.mocked,
            chaos: txn.chaos,
            health_score: self.health.score(endpoint_key).unwrap_or(100.0),
        }
    }

    fn sample_from(txn: &Transaction) -> HealthSample {
        let body_size = txn.resp_body.as_ref().map(|v| v.to_string().len()).unwrap_or(0);
        HealthSample {
            latency_ms: txn.latency_ms,
            status_code: txn.status,
            body_size_bytes: body_size,
            timestamp_ms: txn.timestamp_ms,
        }
    }

    /// Called by the Consolidator for each drained transaction: updates the
    /// Behavior Store, Health Monitor, and Drift Detector, then returns the
    /// event to broadcast.
    pub fn consolidate_one(&self, txn: Transaction) -> TransactionEvent {
        let endpoint_key = txn.path.clone();

        if txn.chaos {
            // Chaos-forced responses are not fed into the learner (§9): only
            // latency/status are recorded.
            self.behavior.record(&endpoint_key, txn.timestamp_ms, txn.latency_ms, txn.status, None, None);
        } else {
            // Snapshot the schema as stored *before* this observation is
            // merged in: merge already relaxes `required` to the intersection
            // and unions in new fields (§4.2), so diffing against the
            // post-merge descriptor can never see a `missing` or `added`
            // field (§4.5).
            let prior_response_schema = self.behavior.get(&endpoint_key).and_then(|b| b.response_schema);

            self.behavior.record(
                &endpoint_key,
                txn.timestamp_ms,
                txn.latency_ms,
                txn.status,
                txn.req_body.as_ref(),
                txn.resp_body.as_ref(),
            );

            if let Some(response_schema) = prior_response_schema {
                if let Some(observed) = txn.resp_body.as_ref().map(crate::schema::infer) {
                    self.drift.write().register(&endpoint_key, &response_schema, &observed, txn.timestamp_ms);
                }
            }
        }

        let active_drift = self.drift.read().has_active(&endpoint_key);
        let sample = Self::sample_from(&txn);
        self.health.record(&endpoint_key, sample, active_drift);

        self.transaction_event(&endpoint_key, &txn)
    }
}
