//! Health Monitor (§4.6): sliding windows per endpoint, adaptive anomaly
//! detection, and a 0–100 health score.
//!
//! Per the design commitment in §9, long-horizon latency/size baselines use
//! an EMA while the recent error rate is read from a fixed-size ring
//! buffer — the two are deliberately not interchangeable.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Smoothing factor for all EMAs in this module (§4.4, reused here).
const ALPHA: f64 = 0.1;
/// Default ring buffer capacity (§3 Health Metric).
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;
/// Anomaly evaluation is suppressed until this many samples have
/// established a baseline.
const MIN_SAMPLES_FOR_BASELINE: u64 = 3;

/// One observed sample feeding the Health Monitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthSample {
    pub latency_ms: u64,
    pub status_code: u16,
    pub body_size_bytes: usize,
    pub timestamp_ms: i64,
}

/// Category of a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    Latency,
    ErrorRate,
    SizeDrift,
    ActiveDrift,
}

/// A single anomaly flagged for one evaluated sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severe: bool,
    pub penalty: f64,
}

/// Health band derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBand {
    Healthy,
    Degraded,
    Critical,
}

impl HealthBand {
    fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Healthy
        } else if score >= 50.0 {
            Self::Degraded
        } else {
            Self::Critical
        }
    }
}

/// Result of evaluating one new sample against the prior baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthEvaluation {
    pub score: f64,
    pub band: HealthBand,
    pub anomalies: Vec<Anomaly>,
}

/// Per-endpoint health state: the ring buffer plus the long-horizon EMAs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointHealth {
    window: VecDeque<HealthSample>,
    capacity: usize,
    latency_mean: f64,
    latency_m2: f64,
    error_rate_ema: f64,
    size_mean: f64,
    samples_seen: u64,
    last_score: f64,
}

impl Default for EndpointHealth {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_WINDOW_CAPACITY)
    }
}

impl EndpointHealth {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            latency_mean: 0.0,
            latency_m2: 0.0,
            error_rate_ema: 0.0,
            size_mean: 0.0,
            samples_seen: 0,
            last_score: 100.0,
        }
    }

    pub fn last_score(&self) -> f64 {
        self.last_score
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// Record a new sample, evaluating it against the baseline established
    /// *before* this sample, then folding it into that baseline.
    pub fn record(&mut self, sample: HealthSample, active_drift: bool) -> HealthEvaluation {
        let prev_mean = self.latency_mean;
        let prev_m2 = self.latency_m2;
        let prev_sigma = (prev_m2 - prev_mean * prev_mean).max(0.0).sqrt();
        let prev_error_rate = self.error_rate_ema;
        let prev_size_mean = self.size_mean;
        let baseline_ready = self.samples_seen >= MIN_SAMPLES_FOR_BASELINE;

        let mut anomalies = Vec::new();

        if baseline_ready {
            if let Some(a) = evaluate_latency(sample.latency_ms as f64, prev_mean, prev_sigma) {
                anomalies.push(a);
            }
        }

        // Push into the ring buffer (short-horizon window) before computing
        // the current-window error rate, so "current" includes this sample.
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);

        if baseline_ready {
            let window_error_rate = self.window_error_rate();
            if let Some(a) = evaluate_error_rate(window_error_rate, prev_error_rate) {
                anomalies.push(a);
            }
            if let Some(a) = evaluate_size_drift(sample.body_size_bytes as f64, prev_size_mean) {
                anomalies.push(a);
            }
        }

        if active_drift {
            anomalies.push(Anomaly { kind: AnomalyKind::ActiveDrift, severe: false, penalty: 20.0 });
        }

        // Fold the new sample into the long-horizon EMAs.
        let x = sample.latency_ms as f64;
        self.latency_mean = (1.0 - ALPHA) * prev_mean + ALPHA * x;
        self.latency_m2 = (1.0 - ALPHA) * prev_m2 + ALPHA * x * x;
        let is_error = f64::from(u8::from(sample.status_code >= 500));
        self.error_rate_ema = (1.0 - ALPHA) * prev_error_rate + ALPHA * is_error;
        self.size_mean = (1.0 - ALPHA) * prev_size_mean + ALPHA * (sample.body_size_bytes as f64);
        self.samples_seen += 1;

        let penalty: f64 = anomalies.iter().map(|a| a.penalty).sum();
        let score = (100.0 - penalty).clamp(0.0, 100.0);
        self.last_score = score;
        HealthEvaluation { score, band: HealthBand::from_score(score), anomalies }
    }

    fn window_error_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let errors = self.window.iter().filter(|s| s.status_code >= 500).count();
        errors as f64 / self.window.len() as f64
    }

    /// Coefficient of variation of latency over the long-horizon EMA.
    pub fn coefficient_of_variation(&self) -> f64 {
        let sigma = (self.latency_m2 - self.latency_mean * self.latency_mean).max(0.0).sqrt();
        sigma / self.latency_mean.max(1.0)
    }

    pub fn latency_mean(&self) -> f64 {
        self.latency_mean
    }

    pub fn latency_stddev(&self) -> f64 {
        (self.latency_m2 - self.latency_mean * self.latency_mean).max(0.0).sqrt()
    }

    pub fn mean_response_size(&self) -> f64 {
        self.size_mean
    }

    pub fn recent_error_rate(&self) -> f64 {
        self.window_error_rate()
    }
}

fn evaluate_latency(x: f64, prev_mean: f64, prev_sigma: f64) -> Option<Anomaly> {
    let cv = (prev_sigma / prev_mean.max(1.0)).min(1.0);
    let z_thr = (2.0 + 4.0 * cv).clamp(2.0, 6.0);
    let sigma = prev_sigma.max(1.0);
    let z = (x - prev_mean) / sigma;
    if z > z_thr {
        let severe = z > 2.0 * z_thr;
        let penalty = if severe { 22.5 } else { 15.0 };
        Some(Anomaly { kind: AnomalyKind::Latency, severe, penalty })
    } else {
        None
    }
}

fn evaluate_error_rate(window_rate: f64, baseline_rate: f64) -> Option<Anomaly> {
    let baseline = baseline_rate.max(1.0 / DEFAULT_WINDOW_CAPACITY as f64);
    if window_rate <= 0.0 {
        return None;
    }
    let ratio = window_rate / baseline;
    if ratio >= 3.0 {
        let severe = ratio >= 5.0;
        let penalty = if severe { 37.5 } else { 25.0 };
        Some(Anomaly { kind: AnomalyKind::ErrorRate, severe, penalty })
    } else {
        None
    }
}

fn evaluate_size_drift(size: f64, baseline_size: f64) -> Option<Anomaly> {
    if baseline_size <= 0.0 {
        return None;
    }
    if (size - baseline_size).abs() > 3.0 * baseline_size {
        Some(Anomaly { kind: AnomalyKind::SizeDrift, severe: false, penalty: 10.0 })
    } else {
        None
    }
}

/// Partitioned collection of [`EndpointHealth`], one lock per endpoint key —
/// the same partition granularity the Behavior Store uses, so the two never
/// contend with each other across unrelated endpoints.
#[derive(Default)]
pub struct HealthRegistry {
    partitions: Mutex<HashMap<String, Arc<Mutex<EndpointHealth>>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self { partitions: Mutex::new(HashMap::new()) }
    }

    fn partition(&self, endpoint_key: &str) -> Arc<Mutex<EndpointHealth>> {
        let mut partitions = self.partitions.lock();
        partitions
            .entry(endpoint_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(EndpointHealth::default())))
            .clone()
    }

    pub fn record(&self, endpoint_key: &str, sample: HealthSample, active_drift: bool) -> HealthEvaluation {
        let partition = self.partition(endpoint_key);
        let mut health = partition.lock();
        health.record(sample, active_drift)
    }

    pub fn score(&self, endpoint_key: &str) -> Option<f64> {
        let partitions = self.partitions.lock();
        partitions.get(endpoint_key).map(|p| p.lock().last_score())
    }

    pub fn all_scores(&self) -> Vec<(String, f64)> {
        let partitions = self.partitions.lock();
        partitions.iter().map(|(k, v)| (k.clone(), v.lock().last_score())).collect()
    }

    pub fn global_score(&self) -> f64 {
        let scores: Vec<f64> = self.all_scores().into_iter().map(|(_, s)| s).collect();
        global_score(&scores)
    }
}

/// Aggregate score across all endpoints (§4.6 "Global score").
pub fn global_score(endpoint_scores: &[f64]) -> f64 {
    if endpoint_scores.is_empty() {
        return 100.0;
    }
    let mean = endpoint_scores.iter().sum::<f64>() / endpoint_scores.len() as f64;
    let min = endpoint_scores.iter().cloned().fold(f64::INFINITY, f64::min);
    0.7 * mean + 0.3 * min
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(latency_ms: u64, status: u16) -> HealthSample {
        HealthSample { latency_ms, status_code: status, body_size_bytes: 512, timestamp_ms: 0 }
    }

    #[test]
    fn scores_are_always_in_bounds() {
        let mut health = EndpointHealth::default();
        for i in 0..200 {
            let latency = if i == 150 { 5000 } else { 100 };
            let eval = health.record(sample(latency, 200), false);
            assert!((0.0..=100.0).contains(&eval.score));
        }
    }

    #[test]
    fn sustained_spike_flags_latency_anomaly() {
        let mut health = EndpointHealth::default();
        for _ in 0..9 {
            health.record(sample(100, 200), false);
        }
        let eval = health.record(sample(2000, 200), false);
        assert!(eval.anomalies.iter().any(|a| a.kind == AnomalyKind::Latency));
        assert!(eval.score < 80.0);
    }

    #[test]
    fn high_cv_endpoint_tolerates_wide_latency_without_flagging() {
        let mut health = EndpointHealth::default();
        let mut x: u64 = 200;
        for i in 0..50 {
            // pseudo-random spread across 200..3000ms without external rand dep
            x = 200 + ((x.wrapping_mul(1103515245).wrapping_add(12345)) % 2800);
            health.record(sample(x, 200), false);
            let _ = i;
        }
        let eval = health.record(sample(3500, 200), false);
        assert!(
            !eval.anomalies.iter().any(|a| a.kind == AnomalyKind::Latency),
            "high-CV endpoint should scale its threshold: cv={}",
            health.coefficient_of_variation()
        );
    }

    #[test]
    fn global_score_is_weighted_mean_and_min() {
        let scores = vec![100.0, 50.0, 90.0];
        let global = global_score(&scores);
        let mean = (100.0 + 50.0 + 90.0) / 3.0;
        assert!((global - (0.7 * mean + 0.3 * 50.0)).abs() < 1e-9);
    }

    #[test]
    fn global_score_defaults_to_100_with_no_endpoints() {
        assert_eq!(global_score(&[]), 100.0);
    }

    #[test]
    fn active_drift_applies_flat_penalty() {
        let mut health = EndpointHealth::default();
        let eval = health.record(sample(100, 200), true);
        assert!((eval.score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn registry_partitions_endpoints_independently() {
        let registry = HealthRegistry::new();
        registry.record("/a", sample(100, 200), false);
        registry.record("/b", sample(100, 500), false);
        assert_eq!(registry.score("/a"), Some(100.0));
        assert!(registry.score("/b").unwrap() <= 100.0);
        assert_eq!(registry.score("/unknown"), None);
    }
}
