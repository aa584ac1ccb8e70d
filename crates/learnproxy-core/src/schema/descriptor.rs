//! The recursive schema descriptor and its merge algebra.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Format hint assigned to string fields by the generator, never by the
/// learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatHint {
    Uuid,
    Email,
    IsoDate,
    Url,
    Slug,
    Hex,
    Base64,
}

/// A recursive, tagged-union description of a JSON shape, with per-node
/// observation counts used by [`merge`].
///
/// Persisted form: `{"kind":"object","fields":{...},"required":
/// [...],"count":N}` via the internally-tagged `kind` discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Descriptor {
    Null {
        count: u64,
    },
    Bool {
        count: u64,
    },
    Number {
        count: u64,
    },
    String {
        count: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format_hint: Option<FormatHint>,
    },
    Object {
        fields: BTreeMap<String, Descriptor>,
        #[serde(default)]
        nullable: BTreeSet<String>,
        required: BTreeSet<String>,
        count: u64,
    },
    Array {
        element: Box<Descriptor>,
        min_len: usize,
        max_len: usize,
        count: u64,
    },
    Union {
        branches: Vec<Descriptor>,
        count: u64,
    },
}

impl Descriptor {
    /// Observation count carried by this node, regardless of variant.
    pub fn count(&self) -> u64 {
        match self {
            Self::Null { count }
            | Self::Bool { count }
            | Self::Number { count }
            | Self::Union { count, .. }
            | Self::String { count, .. }
            | Self::Object { count, .. }
            | Self::Array { count, .. } => *count,
        }
    }

    fn add_count(self, extra: u64) -> Self {
        match self {
            Self::Null { count } => Self::Null { count: count + extra },
            Self::Bool { count } => Self::Bool { count: count + extra },
            Self::Number { count } => Self::Number { count: count + extra },
            Self::String { count, format_hint } => {
                Self::String { count: count + extra, format_hint }
            }
            Self::Object { fields, nullable, required, count } => {
                Self::Object { fields, nullable, required, count: count + extra }
            }
            Self::Array { element, min_len, max_len, count } => {
                Self::Array { element, min_len, max_len, count: count + extra }
            }
            Self::Union { branches, count } => Self::Union { branches, count: count + extra },
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Self::Null { .. } => 0,
            Self::Bool { .. } => 1,
            Self::Number { .. } => 2,
            Self::String { .. } => 3,
            Self::Object { .. } => 4,
            Self::Array { .. } => 5,
            Self::Union { .. } => 6,
        }
    }
}

fn same_kind(a: &Descriptor, b: &Descriptor) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Merge two descriptors observed at the same structural path.
///
/// Merge is commutative and associative at the structural level: observation
/// counts and first-seen timestamps differ between orderings, but shape does
/// not (verified by property tests in `tests/`).
pub fn merge(a: Descriptor, b: Descriptor) -> Descriptor {
    use Descriptor::{Array, Bool, Null, Number, Object, String, Union};

    match (a, b) {
        (Null { count: c1 }, Null { count: c2 }) => Null { count: c1 + c2 },
        (Null { count: cn }, other) | (other, Null { count: cn }) => other.add_count(cn),

        (Bool { count: c1 }, Bool { count: c2 }) => Bool { count: c1 + c2 },
        (Number { count: c1 }, Number { count: c2 }) => Number { count: c1 + c2 },
        (
            String { count: c1, format_hint: f1 },
            String { count: c2, format_hint: f2 },
        ) => String { count: c1 + c2, format_hint: f1.or(f2) },

        (
            Object { fields: f1, nullable: n1, required: r1, count: c1 },
            Object { fields: f2, nullable: n2, required: r2, count: c2 },
        ) => merge_objects(f1, n1, r1, c1, f2, n2, r2, c2),

        (
            Array { element: e1, min_len: mn1, max_len: mx1, count: c1 },
            Array { element: e2, min_len: mn2, max_len: mx2, count: c2 },
        ) => Array {
            element: Box::new(merge(*e1, *e2)),
            min_len: mn1.min(mn2),
            max_len: mx1.max(mx2),
            count: c1 + c2,
        },

        (Union { branches: b1, count: c1 }, Union { branches: b2, count: c2 }) => {
            Union { branches: merge_branches(b1, b2), count: c1 + c2 }
        }
        (Union { branches, count: c1 }, other) | (other, Union { branches, count: c1 }) => {
            let c2 = other.count();
            Union { branches: merge_branches(branches, vec![other]), count: c1 + c2 }
        }

        (a, b) => {
            let (ca, cb) = (a.count(), b.count());
            Union { branches: merge_branches(vec![a], vec![b]), count: ca + cb }
        }
    }
}

/// Fold `new_ones` into `existing`, merging any branch that shares a kind
/// with an incoming one instead of appending a duplicate, then sorting for
/// a canonical (associativity-preserving) order.
fn merge_branches(mut existing: Vec<Descriptor>, new_ones: Vec<Descriptor>) -> Vec<Descriptor> {
    for nb in new_ones {
        if let Some(idx) = existing.iter().position(|e| same_kind(e, &nb)) {
            let merged = merge(existing.remove(idx), nb);
            existing.push(merged);
        } else {
            existing.push(nb);
        }
    }
    existing.sort_by_key(Descriptor::kind_rank);
    existing
}

#[allow(clippy::too_many_arguments)]
fn merge_objects(
    f1: BTreeMap<String, Descriptor>,
    n1: BTreeSet<String>,
    r1: BTreeSet<String>,
    c1: u64,
    f2: BTreeMap<String, Descriptor>,
    n2: BTreeSet<String>,
    r2: BTreeSet<String>,
    c2: u64,
) -> Descriptor {
    let mut fields = BTreeMap::new();
    let mut nullable: BTreeSet<String> = n1.union(&n2).cloned().collect();

    let all_keys: BTreeSet<&String> = f1.keys().chain(f2.keys()).collect();
    for key in all_keys {
        match (f1.get(key), f2.get(key)) {
            (Some(d1), Some(d2)) => {
                let d1_null = matches!(d1, Descriptor::Null { .. });
                let d2_null = matches!(d2, Descriptor::Null { .. });
                if d1_null != d2_null {
                    nullable.insert(key.clone());
                }
                fields.insert(key.clone(), merge(d1.clone(), d2.clone()));
            }
            (Some(d), None) | (None, Some(d)) => {
                fields.insert(key.clone(), d.clone());
            }
            (None, None) => unreachable!("key came from the union of both field maps"),
        }
    }

    let required = r1.intersection(&r2).cloned().collect();
    Descriptor::Object { fields, nullable, required, count: c1 + c2 }
}
