//! Drift Detector: compares a stored response descriptor against a
//! newly observed one, field path by field path, and scores the result.
//!
//! Alerts are append-only with a mutable `resolved` flag: the registry
//! never overwrites a past alert, it only adds new ones and flips
//! `resolved` on explicit admin action (`POST
//! /admin/drift-alerts/{id}/resolve`).

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::Descriptor;

/// Minimum observation count the stored descriptor must carry before drift
/// detection runs, to avoid flagging noise from an under-learned schema.
pub const MIN_OBSERVATIONS_FOR_DRIFT: u64 = 3;

/// Severity of a single drift issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Breaking,
}

/// The nature of a field-path discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    Added,
    TypeChanged,
}

/// A single detected discrepancy between the stored and observed schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub field_path: String,
    pub kind: IssueKind,
    pub severity: Severity,
    pub narration: String,
}

/// The outcome of comparing `stored` against `observed` for one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftAlert {
    pub id: Uuid,
    pub endpoint_key: String,
    pub timestamp_ms: i64,
    pub score: u32,
    pub issues: Vec<Issue>,
    pub resolved: bool,
}

impl DriftAlert {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Compare `stored` against `observed`, walking both trees in lockstep by
/// field path. Returns `None` if `stored` has not accumulated enough
/// observations yet, or no discrepancy was found.
fn detect(stored: &Descriptor, observed: &Descriptor) -> Option<(u32, Vec<Issue>)> {
    if stored.count() < MIN_OBSERVATIONS_FOR_DRIFT {
        return None;
    }

    let mut issues = Vec::new();
    walk("$", stored, observed, &mut issues);
    if issues.is_empty() {
        return None;
    }

    let breaking = issues.iter().filter(|i| i.severity == Severity::Breaking).count() as u32;
    let warning = issues.iter().filter(|i| i.severity == Severity::Warning).count() as u32;
    let info = issues.iter().filter(|i| i.severity == Severity::Info).count() as u32;
    let score = (40 * breaking + 15 * warning + 3 * info).min(100);

    Some((score, issues))
}

fn walk(path: &str, stored: &Descriptor, observed: &Descriptor, issues: &mut Vec<Issue>) {
    match (stored, observed) {
        (Descriptor::Object { fields: sf, required: sr, .. }, Descriptor::Object { fields: of, .. }) => {
            for field in sr {
                if !of.contains_key(field) {
                    let field_path = format!("{path}.{field}");
                    issues.push(Issue {
                        narration: narrate_missing(field),
                        field_path,
                        kind: IssueKind::Missing,
                        severity: Severity::Breaking,
                    });
                }
            }
            for field in of.keys() {
                if !sf.contains_key(field) {
                    let field_path = format!("{path}.{field}");
                    issues.push(Issue {
                        narration: narrate_added(field),
                        field_path,
                        kind: IssueKind::Added,
                        severity: Severity::Info,
                    });
                }
            }
            for (field, s_child) in sf {
                if let Some(o_child) = of.get(field) {
                    let field_path = format!("{path}.{field}");
                    walk(&field_path, s_child, o_child, issues);
                }
            }
        }
        (Descriptor::Array { element: se, .. }, Descriptor::Array { element: oe, .. }) => {
            walk(&format!("{path}[]"), se, oe, issues);
        }
        _ => {
            if !same_shape_kind(stored, observed) {
                issues.push(Issue {
                    field_path: path.to_string(),
                    kind: IssueKind::TypeChanged,
                    severity: Severity::Breaking,
                    narration: narrate_type_changed(path, kind_name(stored), kind_name(observed)),
                });
            } else if let (
                Descriptor::String { format_hint: sh, .. },
                Descriptor::String { format_hint: oh, .. },
            ) = (stored, observed)
            {
                if sh != oh {
                    issues.push(Issue {
                        field_path: path.to_string(),
                        kind: IssueKind::TypeChanged,
                        severity: Severity::Warning,
                        narration: narrate_format_changed(path, *sh, *oh),
                    });
                }
            }
        }
    }
}

fn same_shape_kind(a: &Descriptor, b: &Descriptor) -> bool {
    kind_name(a) == kind_name(b)
}

fn kind_name(d: &Descriptor) -> &'static str {
    match d {
        Descriptor::Null { .. } => "null",
        Descriptor::Bool { .. } => "bool",
        Descriptor::Number { .. } => "number",
        Descriptor::String { .. } => "string",
        Descriptor::Object { .. } => "object",
        Descriptor::Array { .. } => "array",
        Descriptor::Union { .. } => "union",
    }
}

fn narrate_missing(field: &str) -> String {
    format!(
        "Field \"{field}\" was previously always present and is now missing from the response. \
         Consumers that read it directly will likely break; treat this as a breaking change."
    )
}

fn narrate_added(field: &str) -> String {
    format!(
        "Field \"{field}\" appeared in the response for the first time. This is usually safe for \
         existing consumers, but worth noting in case it was unintentional."
    )
}

fn narrate_type_changed(path: &str, from: &str, to: &str) -> String {
    format!(
        "The value at \"{path}\" changed shape from {from} to {to}. Any consumer that parses this \
         field with a fixed type will fail; treat this as a breaking change."
    )
}

fn narrate_format_changed(path: &str, from: Option<crate::schema::FormatHint>, to: Option<crate::schema::FormatHint>) -> String {
    format!(
        "The string at \"{path}\" looked like {from:?} before and now looks like {to:?}. The \
         underlying type is unchanged, but consumers that validate the format may reject new values."
    )
}

/// Append-only collection of [`DriftAlert`]s plus a per-endpoint pointer to
/// the currently active (unresolved) one, which the Health Monitor consults
/// to apply the active-drift penalty.
#[derive(Debug, Default)]
pub struct DriftRegistry {
    alerts: BTreeMap<Uuid, DriftAlert>,
    active_by_endpoint: HashMap<String, Uuid>,
}

impl DriftRegistry {
    pub fn new() -> Self {
        Self { alerts: BTreeMap::new(), active_by_endpoint: HashMap::new() }
    }

    /// Run drift detection for one endpoint and, if a discrepancy is found
    /// and no active alert with the same issue set already exists, append a
    /// new alert. Returns the alert's id when one was newly appended.
    pub fn register(
        &mut self,
        endpoint_key: &str,
        stored: &Descriptor,
        observed: &Descriptor,
        timestamp_ms: i64,
    ) -> Option<Uuid> {
        let (score, issues) = detect(stored, observed)?;

        if let Some(active_id) = self.active_by_endpoint.get(endpoint_key) {
            if let Some(active) = self.alerts.get(active_id) {
                if active.issues == issues {
                    return None;
                }
            }
        }

        let id = Uuid::new_v4();
        let alert = DriftAlert {
            id,
            endpoint_key: endpoint_key.to_string(),
            timestamp_ms,
            score,
            issues,
            resolved: false,
        };
        self.alerts.insert(id, alert);
        self.active_by_endpoint.insert(endpoint_key.to_string(), id);
        Some(id)
    }

    pub fn has_active(&self, endpoint_key: &str) -> bool {
        self.active_by_endpoint.contains_key(endpoint_key)
    }

    pub fn get(&self, id: &Uuid) -> Option<&DriftAlert> {
        self.alerts.get(id)
    }

    /// All alerts, optionally filtered to unresolved ones, newest first.
    pub fn list(&self, unresolved_only: bool) -> Vec<&DriftAlert> {
        let mut items: Vec<&DriftAlert> =
            self.alerts.values().filter(|a| !unresolved_only || !a.resolved).collect();
        items.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        items
    }

    /// Mark an alert resolved. Returns `false` if the id is unknown.
    pub fn resolve(&mut self, id: &Uuid) -> bool {
        let Some(alert) = self.alerts.get_mut(id) else {
            return false;
        };
        alert.resolved = true;
        if self.active_by_endpoint.get(&alert.endpoint_key) == Some(id) {
            self.active_by_endpoint.remove(&alert.endpoint_key);
        }
        true
    }

    pub fn snapshot(&self) -> HashMap<Uuid, DriftAlert> {
        self.alerts.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    /// Load alerts persisted from a prior run, rebuilding the active-alert
    /// index from whatever was left unresolved.
    pub fn restore(&mut self, alerts: HashMap<Uuid, DriftAlert>) {
        self.alerts.clear();
        self.active_by_endpoint.clear();
        for (id, alert) in alerts {
            if !alert.resolved {
                self.active_by_endpoint.insert(alert.endpoint_key.clone(), id);
            }
            self.alerts.insert(id, alert);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::infer;
    use serde_json::json;

    fn descriptor_with_count(value: &serde_json::Value, count: u64) -> Descriptor {
        match infer(value) {
            Descriptor::Object { fields, nullable, required, .. } => {
                Descriptor::Object { fields, nullable, required, count }
            }
            other => other,
        }
    }

    #[test]
    fn below_observation_threshold_returns_none() {
        let stored = descriptor_with_count(&json!({"id": 1}), 1);
        let observed = infer(&json!({"id": 1}));
        assert!(detect(&stored, &observed).is_none());
    }

    #[test]
    fn missing_required_field_is_breaking() {
        let stored = descriptor_with_count(&json!({"id": 1, "name": "a"}), 5);
        let observed = infer(&json!({"id": 1}));
        let (score, issues) = detect(&stored, &observed).unwrap();
        assert!(issues.iter().any(|i| i.kind == IssueKind::Missing && i.severity == Severity::Breaking));
        assert!(score >= 40);
    }

    #[test]
    fn new_field_is_info_only() {
        let stored = descriptor_with_count(&json!({"id": 1}), 5);
        let observed = infer(&json!({"id": 1, "extra": true}));
        let (score, issues) = detect(&stored, &observed).unwrap();
        assert!(issues.iter().any(|i| i.kind == IssueKind::Added && i.severity == Severity::Info));
        assert_eq!(score, 3);
    }

    #[test]
    fn type_change_is_breaking() {
        let stored = descriptor_with_count(&json!({"id": 1}), 5);
        let observed = infer(&json!({"id": "not-a-number"}));
        let (_, issues) = detect(&stored, &observed).unwrap();
        assert!(issues.iter().any(|i| i.kind == IssueKind::TypeChanged && i.severity == Severity::Breaking));
    }

    #[test]
    fn score_is_capped_at_100() {
        let mut fields = std::collections::BTreeMap::new();
        let mut required = std::collections::BTreeSet::new();
        for i in 0..10 {
            fields.insert(format!("f{i}"), Descriptor::Number { count: 1 });
            required.insert(format!("f{i}"));
        }
        let stored = Descriptor::Object { fields, nullable: Default::default(), required, count: 5 };
        let observed = Descriptor::Object {
            fields: std::collections::BTreeMap::new(),
            nullable: Default::default(),
            required: std::collections::BTreeSet::new(),
            count: 1,
        };
        let (score, _) = detect(&stored, &observed).unwrap();
        assert_eq!(score, 100);
    }

    #[test]
    fn registry_tracks_active_alerts_until_resolved() {
        let mut registry = DriftRegistry::new();
        let stored = descriptor_with_count(&json!({"id": 1, "name": "a"}), 5);
        let observed = infer(&json!({"id": 1}));
        let id = registry.register("/users/{id}", &stored, &observed, 0).unwrap();
        assert!(registry.has_active("/users/{id}"));
        assert!(registry.resolve(&id));
        assert!(!registry.has_active("/users/{id}"));
        assert!(registry.get(&id).unwrap().resolved);
    }

    #[test]
    fn registering_the_same_discrepancy_twice_does_not_duplicate() {
        let mut registry = DriftRegistry::new();
        let stored = descriptor_with_count(&json!({"id": 1, "name": "a"}), 5);
        let observed = infer(&json!({"id": 1}));
        let first = registry.register("/users/{id}", &stored, &observed, 0);
        let second = registry.register("/users/{id}", &stored, &observed, 1);
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(registry.list(false).len(), 1);
    }

    #[test]
    fn list_unresolved_only_filters_resolved_alerts() {
        let mut registry = DriftRegistry::new();
        let stored = descriptor_with_count(&json!({"id": 1, "name": "a"}), 5);
        let observed = infer(&json!({"id": 1}));
        let id = registry.register("/users/{id}", &stored, &observed, 0).unwrap();
        assert_eq!(registry.list(true).len(), 1);
        registry.resolve(&id);
        assert_eq!(registry.list(true).len(), 0);
        assert_eq!(registry.list(false).len(), 1);
    }
}
