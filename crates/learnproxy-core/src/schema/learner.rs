//! Recursive inference of a [`Descriptor`] from an observed JSON value.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::descriptor::{merge, Descriptor};

/// Infer a descriptor from a single JSON value.
///
/// `object` yields a field-map of recursively-inferred descriptors with
/// `required` set to every observed field name. `array` yields a union
/// descriptor over its elements (via repeated [`merge`]) with
/// `length_range = (n, n)`.
pub fn infer(value: &Value) -> Descriptor {
    match value {
        Value::Null => Descriptor::Null { count: 1 },
        Value::Bool(_) => Descriptor::Bool { count: 1 },
        Value::Number(_) => Descriptor::Number { count: 1 },
        Value::String(_) => Descriptor::String { count: 1, format_hint: None },
        Value::Array(items) => infer_array(items),
        Value::Object(map) => infer_object(map),
    }
}

fn infer_array(items: &[Value]) -> Descriptor {
    let mut element: Option<Descriptor> = None;
    for item in items {
        let inferred = infer(item);
        element = Some(match element {
            None => inferred,
            Some(acc) => merge(acc, inferred),
        });
    }
    let n = items.len();
    Descriptor::Array {
        element: Box::new(element.unwrap_or(Descriptor::Null { count: 0 })),
        min_len: n,
        max_len: n,
        count: 1,
    }
}

fn infer_object(map: &serde_json::Map<String, Value>) -> Descriptor {
    let mut fields = BTreeMap::new();
    let mut required = BTreeSet::new();
    for (key, value) in map {
        fields.insert(key.clone(), infer(value));
        required.insert(key.clone());
    }
    Descriptor::Object { fields, nullable: BTreeSet::new(), required, count: 1 }
}

/// Infer a descriptor from a value and fold it into an existing one, the
/// operation the Behavior Store performs on every observed request/response
/// body.
pub fn learn(existing: Option<Descriptor>, value: &Value) -> Descriptor {
    let observed = infer(value);
    match existing {
        None => observed,
        Some(prior) => merge(prior, observed),
    }
}
