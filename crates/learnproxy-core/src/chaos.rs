//! Chaos Profile: per-endpoint or global fault injection configuration,
//! held behind a copy-on-write pointer so that the hot request path
//! never blocks reading it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Chaos-injected latency is clamped to this ceiling regardless of what a
/// profile requests.
pub const MAX_EXTRA_LATENCY_MS: u64 = 30_000;

/// `{failure_probability ∈ [0,1], extra_latency_ms ∈ ℕ, forced_status_code ∈
/// ℕ ∪ {none}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChaosProfile {
    #[serde(default)]
    pub failure_probability: f64,
    #[serde(default)]
    pub extra_latency_ms: u64,
    #[serde(default)]
    pub forced_status_code: Option<u16>,
}

impl Default for ChaosProfile {
    fn default() -> Self {
        Self { failure_probability: 0.0, extra_latency_ms: 0, forced_status_code: None }
    }
}

impl ChaosProfile {
    /// Is this profile a no-op (no latency, no forced failure)?
    pub fn is_inert(&self) -> bool {
        self.failure_probability <= 0.0 && self.extra_latency_ms == 0 && self.forced_status_code.is_none()
    }

    pub fn clamped_latency_ms(&self) -> u64 {
        self.extra_latency_ms.min(MAX_EXTRA_LATENCY_MS)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ChaosTable {
    global: ChaosProfile,
    by_endpoint: HashMap<String, ChaosProfile>,
}

/// Readers take an `Arc` clone under a short-lived read lock, so they never
/// contend with a writer swapping in a whole new table — the "pointer swap"
/// the concurrency model calls for, in safe code.
#[derive(Default)]
pub struct ChaosRegistry {
    table: RwLock<Arc<ChaosTable>>,
}

impl ChaosRegistry {
    pub fn new() -> Self {
        Self { table: RwLock::new(Arc::new(ChaosTable::default())) }
    }

    /// Resolve the effective profile for an endpoint: endpoint-specific
    /// override if set, else the global profile.
    pub fn effective(&self, endpoint_key: &str) -> ChaosProfile {
        let table = self.table.read().clone();
        table.by_endpoint.get(endpoint_key).copied().unwrap_or(table.global)
    }

    /// The global profile, ignoring any per-endpoint overrides.
    pub fn global(&self) -> ChaosProfile {
        self.table.read().global
    }

    /// All per-endpoint overrides currently configured.
    pub fn endpoint_overrides(&self) -> HashMap<String, ChaosProfile> {
        self.table.read().by_endpoint.clone()
    }

    pub fn set_global(&self, profile: ChaosProfile) {
        let current = self.table.read().clone();
        let mut next = (*current).clone();
        next.global = profile;
        *self.table.write() = Arc::new(next);
    }

    pub fn set_endpoint(&self, endpoint_key: &str, profile: ChaosProfile) {
        let current = self.table.read().clone();
        let mut next = (*current).clone();
        next.by_endpoint.insert(endpoint_key.to_string(), profile);
        *self.table.write() = Arc::new(next);
    }

    pub fn clear_endpoint(&self, endpoint_key: &str) {
        let current = self.table.read().clone();
        let mut next = (*current).clone();
        next.by_endpoint.remove(endpoint_key);
        *self.table.write() = Arc::new(next);
    }
}

/// Outcome of applying a chaos profile before forwarding.
pub enum ChaosOutcome {
    /// No chaos: proceed to forward normally.
    Passthrough,
    /// Short-circuit straight to responding with this status, after
    /// sleeping for the clamped extra latency.
    ForcedResponse { status_code: u16, extra_latency_ms: u64 },
    /// Skip the forward attempt and treat it as a transport failure, after
    /// sleeping for the clamped extra latency.
    SimulatedError { extra_latency_ms: u64 },
    /// Proceed to forward, but after the clamped extra latency.
    DelayedPassthrough { extra_latency_ms: u64 },
}

/// Decide what chaos to apply for one request, given a profile and a
/// caller-supplied `[0,1)` roll (injectable for deterministic tests).
pub fn apply(profile: &ChaosProfile, roll: f64) -> ChaosOutcome {
    let latency = profile.clamped_latency_ms();
    if let Some(status_code) = profile.forced_status_code {
        return ChaosOutcome::ForcedResponse { status_code, extra_latency_ms: latency };
    }
    if roll < profile.failure_probability {
        return ChaosOutcome::SimulatedError { extra_latency_ms: latency };
    }
    if latency > 0 {
        return ChaosOutcome::DelayedPassthrough { extra_latency_ms: latency };
    }
    ChaosOutcome::Passthrough
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_override_takes_precedence_over_global() {
        let registry = ChaosRegistry::new();
        registry.set_global(ChaosProfile { extra_latency_ms: 100, ..Default::default() });
        registry.set_endpoint(
            "/users/{id}",
            ChaosProfile { extra_latency_ms: 5000, ..Default::default() },
        );
        assert_eq!(registry.effective("/users/{id}").extra_latency_ms, 5000);
        assert_eq!(registry.effective("/other").extra_latency_ms, 100);
    }

    #[test]
    fn latency_is_clamped_to_ceiling() {
        let profile = ChaosProfile { extra_latency_ms: 999_999, ..Default::default() };
        assert_eq!(profile.clamped_latency_ms(), MAX_EXTRA_LATENCY_MS);
    }

    #[test]
    fn forced_status_short_circuits_regardless_of_failure_probability() {
        let profile = ChaosProfile { failure_probability: 0.0, forced_status_code: Some(503), ..Default::default() };
        match apply(&profile, 0.99) {
            ChaosOutcome::ForcedResponse { status_code, .. } => assert_eq!(status_code, 503),
            _ => panic!("expected forced response"),
        }
    }

    #[test]
    fn roll_under_probability_simulates_error() {
        let profile = ChaosProfile { failure_probability: 0.5, ..Default::default() };
        match apply(&profile, 0.1) {
            ChaosOutcome::SimulatedError { .. } => {}
            _ => panic!("expected simulated error"),
        }
    }

    #[test]
    fn inert_profile_passes_through() {
        let profile = ChaosProfile::default();
        assert!(profile.is_inert());
        match apply(&profile, 0.5) {
            ChaosOutcome::Passthrough => {}
            _ => panic!("expected passthrough"),
        }
    }

    #[test]
    fn clearing_endpoint_override_falls_back_to_global() {
        let registry = ChaosRegistry::new();
        registry.set_endpoint("/a", ChaosProfile { extra_latency_ms: 10, ..Default::default() });
        registry.clear_endpoint("/a");
        assert_eq!(registry.effective("/a"), ChaosProfile::default());
    }
}
